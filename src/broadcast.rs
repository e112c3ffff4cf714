//! Fan-out of session snapshots to every connection grouped under a session id.

use crate::protocol::ServerMessage;
use crate::types::SessionId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

const GROUP_CAPACITY: usize = 64;

/// One broadcast channel per session id, created on first join
#[derive(Clone, Default)]
pub struct SessionGroups {
    groups: Arc<RwLock<HashMap<SessionId, broadcast::Sender<ServerMessage>>>>,
}

impl SessionGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a session group
    pub async fn subscribe(&self, session_id: &str) -> broadcast::Receiver<ServerMessage> {
        let mut groups = self.groups.write().await;
        groups
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(GROUP_CAPACITY).0)
            .subscribe()
    }

    /// Send to every member of a group. Returns how many received it.
    pub async fn publish(&self, session_id: &str, msg: ServerMessage) -> usize {
        let groups = self.groups.read().await;
        match groups.get(session_id) {
            // Ignore send errors (no receivers connected is fine)
            Some(tx) => tx.send(msg).unwrap_or(0),
            None => 0,
        }
    }

    pub async fn member_count(&self, session_id: &str) -> usize {
        self.groups
            .read()
            .await
            .get(session_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Drop groups nobody is listening to anymore
    pub async fn prune(&self) -> usize {
        let mut groups = self.groups.write().await;
        let before = groups.len();
        groups.retain(|_, tx| tx.receiver_count() > 0);
        before - groups.len()
    }
}
