//! Club socket: join a session, push updates, receive group snapshots.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio::task::JoinHandle;

use super::send_message;
use crate::broadcast::SessionGroups;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::{ConnectionId, SessionId};

/// Per-connection view of the session groups it has joined.
///
/// Each joined group gets a forwarding task that copies group broadcasts into
/// the connection's outbound queue. Dropping the connection stops them all.
pub struct ClubConnection {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<ServerMessage>,
    joined: HashMap<SessionId, JoinHandle<()>>,
}

impl ClubConnection {
    pub fn new(id: ConnectionId, outbound: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            id,
            outbound,
            joined: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_member(&self, session_id: &str) -> bool {
        self.joined.contains_key(session_id)
    }

    async fn join_group(&mut self, groups: &SessionGroups, session_id: &str) {
        if self.is_member(session_id) {
            return;
        }

        let mut rx = groups.subscribe(session_id).await;
        let outbound = self.outbound.clone();
        let connection_id = self.id.clone();
        let group = session_id.to_string();

        let forwarder = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(msg) => {
                        if outbound.send(msg).is_err() {
                            break;
                        }
                    }
                    // Every message is a full snapshot, so skipping stale ones is harmless
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            "Connection {} skipped {} snapshots of session {}",
                            connection_id,
                            skipped,
                            group
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        self.joined.insert(session_id.to_string(), forwarder);
    }

    /// Stop every forwarder, then drop groups left without members.
    /// Returns how many groups were removed.
    pub async fn leave_all(&mut self, groups: &SessionGroups) -> usize {
        for (_, forwarder) in self.joined.drain() {
            forwarder.abort();
            // Resolves once the task, and its receiver, are gone
            let _ = forwarder.await;
        }
        groups.prune().await
    }
}

impl Drop for ClubConnection {
    fn drop(&mut self) {
        for (_, forwarder) in self.joined.drain() {
            forwarder.abort();
        }
    }
}

/// Handle one client message and return the reply for the caller, if any.
/// Group broadcasts go out through [`SessionGroups`], not the return value.
pub async fn handle_message(
    msg: ClientMessage,
    connection: &mut ClubConnection,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::JoinSession {
            session_id,
            display_name,
        } => {
            // Join before reading so no update published in between is missed
            connection.join_group(&state.groups, &session_id).await;

            match state.coordinator.get_session(&session_id).await {
                Ok(session) => {
                    tracing::info!(
                        "Connection {} joined session {} as {}",
                        connection.id(),
                        session_id,
                        display_name
                    );
                    Some(ServerMessage::SessionHydrated { session })
                }
                Err(e) => {
                    tracing::error!("Failed to load session {}: {}", session_id, e);
                    Some(ServerMessage::internal_error())
                }
            }
        }

        ClientMessage::PushUpdate { update } => {
            let session_id = update.session_id.clone();

            match state.coordinator.apply_update(update).await {
                Ok(session) => {
                    let delivered = state
                        .groups
                        .publish(&session_id, ServerMessage::SessionUpdated { session })
                        .await;
                    tracing::debug!(
                        "Session {} updated by {}, delivered to {} connections",
                        session_id,
                        connection.id(),
                        delivered
                    );
                    None
                }
                Err(e) => {
                    tracing::error!("Failed to apply update to session {}: {}", session_id, e);
                    Some(ServerMessage::internal_error())
                }
            }
        }
    }
}

/// WebSocket upgrade handler for collaborative sessions
pub async fn ws_club_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let connection_id = ulid::Ulid::new().to_string();
    tracing::info!("Club WebSocket connection request: {}", connection_id);

    ws.on_upgrade(move |socket| handle_socket(socket, connection_id, state))
}

async fn handle_socket(socket: WebSocket, connection_id: ConnectionId, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let mut connection = ClubConnection::new(connection_id.clone(), outbound_tx);

    loop {
        tokio::select! {
            // Group broadcasts for every session this connection joined
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(msg) => {
                        if !send_message(&mut sender, &msg).await {
                            break;
                        }
                    }
                    None => break,
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if let Some(response) =
                                    handle_message(client_msg, &mut connection, &state).await
                                {
                                    if !send_message(&mut sender, &response).await {
                                        tracing::error!("Failed to send response");
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                let _ = send_message(&mut sender, &error).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    connection.leave_all(&state.groups).await;
    tracing::info!("Club WebSocket connection closed: {}", connection_id);
}
