use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a primary record. Sources derive it from the
/// record's offset, so it is unique across the whole run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A primary entity as returned by a source page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub payload: serde_json::Value,
}

impl Record {
    pub fn new(id: u64, payload: serde_json::Value) -> Self {
        Record {
            id: RecordId(id),
            payload,
        }
    }

    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.payload.get(field)
    }
}
