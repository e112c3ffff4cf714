//! Collaborative session state, kept in a fast cache and a durable store.
//!
//! Reads go cache first, then store, then fall back to a bootstrap session.
//! Writes go to both tiers independently; there is no transaction spanning
//! them and concurrent updates to one session resolve as last write wins.

mod cache;
mod store;

pub use cache::{spawn_cache_sweeper, CacheError, CachePolicy, MemoryCache, SessionCache};
pub use store::{FileStore, MemoryStore, SessionStore, StoreError, StoredSession};

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

use crate::types::{Participant, Session, Update};

pub const CACHE_PREFIX: &str = "club-session:";

pub const STARTER_DOCUMENT: &str = r#"// Club Mode: everyone in this session edits the same script.
// The leader runs it with the Run button.
Console.WriteLine("Hello from the club!");
"#;

/// Failures that escape the coordinator. Cache trouble never does.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("durable store failure: {0}")]
    Store(#[from] StoreError),
}

/// Where a session currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLifecycle {
    /// No record in either tier
    Absent,
    /// Only the cached bootstrap value exists
    Bootstrapped,
    /// At least one update reached the durable store
    Active,
}

pub fn cache_key(session_id: &str) -> String {
    format!("{}{}", CACHE_PREFIX, session_id)
}

/// Default state handed out for a session nobody has written to yet
pub fn bootstrap_session(session_id: &str) -> Session {
    Session {
        session_id: session_id.to_string(),
        code_document: STARTER_DOCUMENT.to_string(),
        console_output: String::new(),
        participants: Vec::new(),
    }
}

/// Compute the new document for an editor delta.
///
/// A `{"fullText": ...}` object replaces the document with its text; anything
/// else that is not blank becomes the document verbatim.
pub fn apply_delta(current: &str, delta: &str) -> String {
    if delta.trim().is_empty() {
        return current.to_string();
    }

    match serde_json::from_str::<Value>(delta) {
        Ok(Value::Object(fields)) => match fields.get("fullText") {
            Some(Value::String(text)) => text.clone(),
            _ => delta.to_string(),
        },
        _ => delta.to_string(),
    }
}

pub fn append_output(current: &str, append: Option<&str>) -> String {
    match append {
        Some(text) if !text.trim().is_empty() => format!("{}\n{}", current, text),
        _ => current.to_string(),
    }
}

/// Add `author` to the roster unless a case-insensitive match exists.
/// Only the first participant ever recorded becomes leader.
pub fn add_participant(participants: &mut Vec<Participant>, author: &str) {
    if author.trim().is_empty() {
        return;
    }

    let author_lower = author.to_lowercase();
    if participants
        .iter()
        .any(|p| p.display_name.to_lowercase() == author_lower)
    {
        return;
    }

    let is_leader = participants.is_empty();
    participants.push(Participant {
        display_name: author.to_string(),
        is_leader,
    });
}

/// Parse a stored roster, treating anything malformed as empty
fn parse_participants(json: &str) -> Vec<Participant> {
    if json.trim().is_empty() {
        return Vec::new();
    }

    serde_json::from_str(json).unwrap_or_else(|e| {
        tracing::warn!("Discarding malformed stored roster: {}", e);
        Vec::new()
    })
}

impl StoredSession {
    pub fn from_session(session: &Session) -> Result<Self, StoreError> {
        Ok(Self {
            session_id: session.session_id.clone(),
            code_document: session.code_document.clone(),
            console_output: session.console_output.clone(),
            participants_json: serde_json::to_string(&session.participants)?,
            updated_at: Utc::now(),
        })
    }

    pub fn into_session(self) -> Session {
        let participants = parse_participants(&self.participants_json);
        Session {
            session_id: self.session_id,
            code_document: self.code_document,
            console_output: self.console_output,
            participants,
        }
    }
}

/// Owns reads and writes of collaborative sessions across both tiers
#[derive(Clone)]
pub struct SessionCoordinator {
    cache: Arc<dyn SessionCache>,
    store: Arc<dyn SessionStore>,
    policy: CachePolicy,
}

impl SessionCoordinator {
    pub fn new(
        cache: Arc<dyn SessionCache>,
        store: Arc<dyn SessionStore>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            cache,
            store,
            policy,
        }
    }

    /// Coordinator over in-process tiers with the default cache policy
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryCache::new()),
            Arc::new(MemoryStore::new()),
            CachePolicy::default(),
        )
    }

    /// Read a session: cache, then store, then the bootstrap value.
    /// Whatever is found warms the cache.
    pub async fn get_session(&self, session_id: &str) -> Result<Session, CoordinatorError> {
        if let Some(session) = self.read_cache(session_id).await {
            return Ok(session);
        }

        let session = match self.store.load(session_id).await? {
            Some(record) => record.into_session(),
            None => {
                tracing::debug!("Bootstrapping new session {}", session_id);
                bootstrap_session(session_id)
            }
        };

        self.write_cache(&session).await;
        Ok(session)
    }

    /// Apply an update and persist the result to both tiers
    pub async fn apply_update(&self, update: Update) -> Result<Session, CoordinatorError> {
        let mut session = self.get_session(&update.session_id).await?;

        session.code_document = apply_delta(&session.code_document, &update.editor_delta);
        session.console_output =
            append_output(&session.console_output, update.output_append.as_deref());
        add_participant(&mut session.participants, &update.author);

        self.persist(&session).await?;
        Ok(session)
    }

    /// Report which tier currently holds a session, without warming anything
    pub async fn lifecycle(&self, session_id: &str) -> Result<SessionLifecycle, CoordinatorError> {
        if self.store.load(session_id).await?.is_some() {
            return Ok(SessionLifecycle::Active);
        }
        if self.read_cache(session_id).await.is_some() {
            return Ok(SessionLifecycle::Bootstrapped);
        }
        Ok(SessionLifecycle::Absent)
    }

    async fn persist(&self, session: &Session) -> Result<(), CoordinatorError> {
        self.write_cache(session).await;

        let record = StoredSession::from_session(session)?;
        self.store.upsert(record).await?;
        Ok(())
    }

    async fn read_cache(&self, session_id: &str) -> Option<Session> {
        let payload = match self.cache.get(&cache_key(session_id)).await {
            Ok(Some(payload)) if !payload.trim().is_empty() => payload,
            Ok(_) => return None,
            Err(e) => {
                tracing::warn!("Session cache read failed for {}: {}", session_id, e);
                return None;
            }
        };

        match serde_json::from_str(&payload) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!("Ignoring malformed cached session {}: {}", session_id, e);
                None
            }
        }
    }

    async fn write_cache(&self, session: &Session) {
        let payload = match serde_json::to_string(session) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Failed to encode session {}: {}", session.session_id, e);
                return;
            }
        };

        if let Err(e) = self
            .cache
            .set(&cache_key(&session.session_id), payload, self.policy)
            .await
        {
            tracing::warn!(
                "Session cache write failed for {}: {}",
                session.session_id,
                e
            );
        }
    }
}
