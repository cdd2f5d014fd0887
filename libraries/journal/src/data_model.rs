use chrono::{DateTime, Utc};

/// An event that can be stored in a journal.
///
/// Implementations usually wrap themselves in a versioned enum before serializing, so old journals
/// keep deserializing after the event type grows.
pub trait Event: Sized + Clone {
    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error>;
    fn from_json(json: &serde_json::Value) -> Result<Self, serde_json::Error>;
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Timestamped<E> {
    pub timestamp: DateTime<Utc>,
    /// Position of the event in its journal.
    pub sequence: usize,
    pub event: E,
}
