// Event store contract
//
// A store is a keyed, ordered event log per session. Sessions are created
// implicitly on first append and destroyed by clear. Retrieval order always
// matches append order; reading an unknown session yields an empty list,
// never an error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;
use crate::event::Event;

/// Metadata describing one persisted session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub id: Uuid,
    /// First event's timestamp
    pub created_at: DateTime<Utc>,
    /// Most recent event's timestamp
    pub last_event_at: DateTime<Utc>,
    pub event_count: usize,
}

impl SessionMetadata {
    /// Derive metadata from an ordered event list; empty sessions have none
    pub fn from_events(id: Uuid, events: &[Event]) -> Option<Self> {
        let first = events.first()?;
        let last = events.last()?;
        Some(Self {
            id,
            created_at: first.timestamp,
            last_event_at: last.timestamp,
            event_count: events.len(),
        })
    }
}

/// Trait for pluggable event logs
///
/// Implementations can keep events in memory, on disk, or in a database; the
/// runtime only relies on this contract.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append an event to a session, creating the session on first use
    async fn append(&self, session_id: Uuid, event: Event) -> Result<(), StoreError>;

    /// The ordered event list for a session; empty for unknown sessions
    async fn events(&self, session_id: Uuid) -> Result<Vec<Event>, StoreError>;

    /// Metadata for every known session
    async fn sessions(&self) -> Result<Vec<SessionMetadata>, StoreError>;

    /// Delete a session and its events; no-op if the session does not exist
    async fn clear(&self, session_id: Uuid) -> Result<(), StoreError>;

    /// Optional optimization hook: a precomputed state for replay shortcuts
    ///
    /// Implementations may always return `None`.
    async fn snapshot(
        &self,
        _session_id: Uuid,
        _position: usize,
    ) -> Result<Option<Value>, StoreError> {
        Ok(None)
    }
}
