// In-memory event store
//
// Keeps all sessions in a HashMap, making it the default for tests,
// examples, and runs that do not need durability.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use rewind_core::{Event, EventStore, SessionMetadata, StoreError};

/// In-memory event store
///
/// Stores events in a HashMap keyed by session ID. Cloning shares the
/// underlying map.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    sessions: Arc<RwLock<HashMap<Uuid, Vec<Event>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Pre-populate a session (useful for testing)
    pub async fn seed(&self, session_id: Uuid, events: Vec<Event>) {
        self.sessions.write().await.insert(session_id, events);
    }

    /// Number of known sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn append(&self, session_id: Uuid, event: Event) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .entry(session_id)
            .or_default()
            .push(event);
        Ok(())
    }

    async fn events(&self, session_id: Uuid) -> Result<Vec<Event>, StoreError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn sessions(&self) -> Result<Vec<SessionMetadata>, StoreError> {
        let sessions = self.sessions.read().await;
        let mut metadata: Vec<SessionMetadata> = sessions
            .iter()
            .filter_map(|(id, events)| SessionMetadata::from_events(*id, events))
            .collect();
        // UUIDv7 ids sort by creation time
        metadata.sort_by_key(|m| m.id);
        Ok(metadata)
    }

    async fn clear(&self, session_id: Uuid) -> Result<(), StoreError> {
        self.sessions.write().await.remove(&session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_creates_session_and_preserves_order() {
        let store = InMemoryStore::new();
        let session = Uuid::now_v7();

        for i in 0..5 {
            store
                .append(session, Event::new("count:incremented", json!({"i": i})))
                .await
                .unwrap();
        }

        let events = store.events(session).await.unwrap();
        assert_eq!(events.len(), 5);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.payload["i"], i);
        }
    }

    #[tokio::test]
    async fn test_unknown_session_yields_empty_list() {
        let store = InMemoryStore::new();
        assert!(store.events(Uuid::now_v7()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sessions_metadata() {
        let store = InMemoryStore::new();
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        store.append(a, Event::new("x:y", json!({}))).await.unwrap();
        store.append(a, Event::new("x:z", json!({}))).await.unwrap();
        store.append(b, Event::new("x:y", json!({}))).await.unwrap();

        let sessions = store.sessions().await.unwrap();
        assert_eq!(sessions.len(), 2);
        let meta_a = sessions.iter().find(|m| m.id == a).unwrap();
        assert_eq!(meta_a.event_count, 2);
        assert!(meta_a.created_at <= meta_a.last_event_at);
    }

    #[tokio::test]
    async fn test_clear_destroys_session_and_is_idempotent() {
        let store = InMemoryStore::new();
        let session = Uuid::now_v7();
        store
            .append(session, Event::new("x:y", json!({})))
            .await
            .unwrap();

        store.clear(session).await.unwrap();
        assert!(store.events(session).await.unwrap().is_empty());
        assert_eq!(store.session_count().await, 0);

        // Clearing an unknown session is a no-op
        store.clear(session).await.unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_defaults_to_unavailable() {
        let store = InMemoryStore::new();
        let snapshot = store.snapshot(Uuid::now_v7(), 3).await.unwrap();
        assert!(snapshot.is_none());
    }
}
