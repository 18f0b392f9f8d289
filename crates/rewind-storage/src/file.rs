// JSONL file-backed event store
//
// One append-only file per session under a root directory, one JSON-encoded
// event per line. Sessions survive process restarts; the format stays
// human-inspectable with standard tools.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use rewind_core::{Event, EventStore, SessionMetadata, StoreError};

/// Durable event store writing one JSONL file per session
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at the given directory, creating it if needed
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io(Uuid::nil(), e.to_string()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_path(&self, session_id: Uuid) -> PathBuf {
        self.root.join(format!("{session_id}.jsonl"))
    }

    fn session_id_from_path(path: &Path) -> Option<Uuid> {
        let stem = path.file_stem()?.to_str()?;
        if path.extension()?.to_str()? != "jsonl" {
            return None;
        }
        stem.parse().ok()
    }

    async fn read_session(&self, session_id: Uuid) -> Result<Vec<Event>, StoreError> {
        let path = self.session_path(session_id);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(session_id, e.to_string())),
        };

        let mut events = Vec::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let event: Event = serde_json::from_str(line)
                .map_err(|e| StoreError::corrupt(session_id, e.to_string()))?;
            events.push(event);
        }
        Ok(events)
    }
}

#[async_trait]
impl EventStore for FileStore {
    async fn append(&self, session_id: Uuid, event: Event) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(&event)
            .map_err(|e| StoreError::io(session_id, e.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.session_path(session_id))
            .await
            .map_err(|e| StoreError::io(session_id, e.to_string()))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| StoreError::io(session_id, e.to_string()))?;
        Ok(())
    }

    async fn events(&self, session_id: Uuid) -> Result<Vec<Event>, StoreError> {
        self.read_session(session_id).await
    }

    async fn sessions(&self) -> Result<Vec<SessionMetadata>, StoreError> {
        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|e| StoreError::io(Uuid::nil(), e.to_string()))?;

        let mut metadata = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StoreError::io(Uuid::nil(), e.to_string()))?
        {
            let Some(session_id) = Self::session_id_from_path(&entry.path()) else {
                continue;
            };
            let events = self.read_session(session_id).await?;
            if let Some(meta) = SessionMetadata::from_events(session_id, &events) {
                metadata.push(meta);
            }
        }
        metadata.sort_by_key(|m| m.id);
        Ok(metadata)
    }

    async fn clear(&self, session_id: Uuid) -> Result<(), StoreError> {
        match fs::remove_file(self.session_path(session_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(session_id, e.to_string())),
        }
    }
}
