//! Durable tier: one record per session id, upserted on every update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::PathBuf,
    sync::Arc,
};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::types::SessionId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored session could not be encoded or decoded: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable row for a session. The roster is kept as a JSON string so a
/// damaged roster does not make the whole record unreadable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredSession {
    pub session_id: SessionId,
    pub code_document: String,
    pub console_output: String,
    #[serde(default = "empty_roster")]
    pub participants_json: String,
    pub updated_at: DateTime<Utc>,
}

fn empty_roster() -> String {
    "[]".to_string()
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<StoredSession>, StoreError>;

    /// Insert or replace the record keyed by `record.session_id`
    async fn upsert(&self, record: StoredSession) -> Result<(), StoreError>;
}

/// Store kept in process memory; contents are lost on restart
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<SessionId, StoredSession>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, session_id: &str) -> Result<Option<StoredSession>, StoreError> {
        Ok(self.records.read().await.get(session_id).cloned())
    }

    async fn upsert(&self, record: StoredSession) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.session_id.clone(), record);
        Ok(())
    }
}

/// Store writing one JSON file per session into a directory.
///
/// File names are the hex SHA-256 of the session id, so any id maps to a
/// fixed-length name that never escapes the directory. Writes land in a uniquely named temp file first and are
/// renamed into place.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(session_id)))
    }
}

fn file_stem(session_id: &str) -> String {
    hex::encode(Sha256::digest(session_id.as_bytes()))
}

#[async_trait]
impl SessionStore for FileStore {
    async fn load(&self, session_id: &str) -> Result<Option<StoredSession>, StoreError> {
        let contents = match tokio::fs::read_to_string(self.path_for(session_id)).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    async fn upsert(&self, record: StoredSession) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(&record.session_id);
        let tmp = self.dir.join(format!(
            "{}.{}.tmp",
            file_stem(&record.session_id),
            ulid::Ulid::new()
        ));

        let json = serde_json::to_string_pretty(&record)?;
        tokio::fs::write(&tmp, json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}
