use chrono::{DateTime, Utc};

use crate::PartialAppState;
use crate::data_model::{Event, Timestamped};

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("journal entry is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("journal entry out of order: expected sequence {expected}, got {got}")]
    OutOfOrder { expected: usize, got: usize },
}

#[derive(Clone, Debug)]
pub struct Journal<E> {
    events: Vec<Timestamped<E>>,
}

impl<E> Default for Journal<E> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

#[derive(serde::Deserialize)]
struct RawEntry {
    timestamp: DateTime<Utc>,
    sequence: usize,
    event: serde_json::Value,
}

impl<E: Event> Journal<E> {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Timestamped<E>> {
        self.events.iter()
    }

    pub fn last(&self) -> Option<&Timestamped<E>> {
        self.events.last()
    }

    /// Appends one event at the end of the journal and returns it with its sequence number.
    pub fn append(&mut self, timestamp: DateTime<Utc>, event: E) -> &Timestamped<E> {
        if let Some(last) = self.events.last()
            && timestamp < last.timestamp
        {
            // The clock went backwards. Sequence order still decides application order.
            log::warn!(
                "Appending event at {timestamp}, earlier than the previous event at {}",
                last.timestamp
            );
        }
        let sequence = self.events.len();
        self.events.push(Timestamped {
            timestamp,
            sequence,
            event,
        });
        &self.events[sequence]
    }

    /// Folds the whole journal into a state.
    pub fn state<A>(&self, initial_state: A::Partial) -> A
    where
        A: PartialAppState<Event = E>,
    {
        apply_events(self.events.iter(), initial_state)
    }

    /// One JSON object per line, each holding the timestamp, the sequence number and the event.
    pub fn to_json_lines(&self) -> Result<String, JournalError> {
        let mut out = String::new();
        for entry in &self.events {
            let line = serde_json::json!({
                "timestamp": entry.timestamp,
                "sequence": entry.sequence,
                "event": entry.event.to_json()?,
            });
            out.push_str(&serde_json::to_string(&line)?);
            out.push('\n');
        }
        Ok(out)
    }

    pub fn from_json_lines(text: &str) -> Result<Self, JournalError> {
        let mut journal = Self::default();
        for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let raw: RawEntry = serde_json::from_str(line)?;
            if raw.sequence != journal.events.len() {
                return Err(JournalError::OutOfOrder {
                    expected: journal.events.len(),
                    got: raw.sequence,
                });
            }
            let event = E::from_json(&raw.event)?;
            journal.events.push(Timestamped {
                timestamp: raw.timestamp,
                sequence: raw.sequence,
                event,
            });
        }
        Ok(journal)
    }
}

pub fn apply_events<'a, E: Event + 'a, A>(
    events: impl Iterator<Item = &'a Timestamped<E>>,
    initial_state: A::Partial,
) -> A
where
    A: PartialAppState<Event = E>,
{
    let mut state = initial_state;
    for event in events {
        state = A::process_event(state, event);
    }

    A::finalize(state)
}
