//! An append-only journal of timestamped events, folded into application state.
//!
//! Model:
//! 1. The app never edits its state in place. Every change is described by an event.
//! 2. Events are appended to a [`Journal`] with the timestamp at which they happened and a sequence
//!    number that is their position in the journal.
//! 3. Starting from a default initial state, the events are applied in sequence order to get the
//!    current state. Applying the same journal to the same initial state always gives the same result.
//!
//! Keeping the journal around means the state can be rebuilt (or audited) at any time, and any single
//! event application is a pure function of the previous state and the event.

pub mod data_model;
mod journal;

pub use data_model::{Event, Timestamped};
pub use journal::{Journal, JournalError, apply_events};

/// Core trait for folding events into state without computing derived state on every step.
pub trait PartialAppState: Sized {
    type Event: Event;

    /// The intermediate state type returned by process_event.
    /// For simple cases, this can just be Self.
    type Partial: Sized;

    /// Process one event. Called for each event when applying many events in a row.
    fn process_event(partial: Self::Partial, event: &Timestamped<Self::Event>) -> Self::Partial;

    /// Compute any derived state. Called once after all events have been processed.
    fn finalize(partial: Self::Partial) -> Self;
}

/// Applies a single event completely, including finalization.
pub trait AppState: PartialAppState {
    fn apply_event(self, event: &Timestamped<Self::Event>) -> Self;
}

impl<T> AppState for T
where
    T: PartialAppState,
    T::Partial: From<T>,
{
    fn apply_event(self, event: &Timestamped<Self::Event>) -> Self {
        let partial = T::Partial::from(self);
        let partial = T::process_event(partial, event);
        T::finalize(partial)
    }
}
