// Event entity type
//
// Events are the only facts in the system: immutable, uniquely identified,
// colon-namespaced (e.g. "task:created"), optionally linked to the event that
// caused their emission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// An immutable, uniquely-identified fact on the event stream.
///
/// `caused_by` optionally links an event to the event that triggered its
/// emission, forming a causal chain. The reference is not validated at
/// creation time; a dangling parent id is allowed and simply unresolved on
/// lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caused_by: Option<Uuid>,
}

impl Event {
    /// Create a new event with a fresh time-ordered id and the current time
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            payload,
            timestamp: Utc::now(),
            caused_by: None,
        }
    }

    /// Create a new event caused by an existing event
    pub fn caused_by(name: impl Into<String>, payload: Value, parent: Uuid) -> Self {
        Self {
            caused_by: Some(parent),
            ..Self::new(name, payload)
        }
    }

    /// Look up this event's causal parent in a recorded sequence
    ///
    /// Returns `None` when the event has no parent or the reference dangles.
    pub fn parent<'a>(&self, events: &'a [Event]) -> Option<&'a Event> {
        let parent_id = self.caused_by?;
        events.iter().find(|e| e.id == parent_id)
    }
}
