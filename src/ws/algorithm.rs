//! Algorithm socket: a one-way stream of steps for a single run.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{Stream, StreamExt},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::send_message;
use crate::engine::{step_stream, AlgorithmRequest, Pacing, Run};
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::{AlgorithmFamily, ConnectionId, PathfindingVariant, SortingVariant};

#[derive(Debug, Clone, Deserialize)]
pub struct AlgorithmQuery {
    pub family: AlgorithmFamily,
    pub pathfinding: Option<PathfindingVariant>,
    pub sorting: Option<SortingVariant>,
    pub seed: i32,
}

impl AlgorithmQuery {
    pub fn request(&self) -> AlgorithmRequest {
        AlgorithmRequest::resolve(self.family, self.pathfinding, self.sorting)
    }
}

/// Step messages for one run, paced and cut short by `cancel`
pub fn step_messages(
    query: &AlgorithmQuery,
    pacing: Pacing,
    cancel: CancellationToken,
) -> impl Stream<Item = ServerMessage> {
    let request = query.request();
    let run = Run::new(request, query.seed);
    step_stream(run, pacing.delay_for(request), cancel)
        .map(|step| ServerMessage::Step(step.to_record()))
}

/// WebSocket upgrade handler for algorithm runs
pub async fn ws_algorithm_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<AlgorithmQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let connection_id = ulid::Ulid::new().to_string();
    tracing::info!(
        "Client {} requested {:?} simulation with seed {}",
        connection_id,
        query.family,
        query.seed
    );

    ws.on_upgrade(move |socket| handle_socket(socket, query, connection_id, state))
}

async fn handle_socket(
    socket: WebSocket,
    query: AlgorithmQuery,
    connection_id: ConnectionId,
    state: Arc<AppState>,
) {
    let (mut sender, mut receiver) = socket.split();
    let cancel = CancellationToken::new();

    // The stream is one-way; anything ending the inbound side cancels the run
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            while let Some(msg) = receiver.next().await {
                match msg {
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            cancel.cancel();
        })
    };

    let messages = step_messages(&query, state.pacing, cancel.clone());
    futures::pin_mut!(messages);

    let mut sent = 0u32;
    while let Some(msg) = messages.next().await {
        if !send_message(&mut sender, &msg).await {
            cancel.cancel();
            break;
        }
        sent += 1;
    }

    if cancel.is_cancelled() {
        tracing::info!(
            "Client {} cancelled the run after {} steps",
            connection_id,
            sent
        );
    } else {
        tracing::info!("Client {} run complete after {} steps", connection_id, sent);
        let _ = send_message(&mut sender, &ServerMessage::Complete).await;
        let _ = sender.send(Message::Close(None)).await;
    }

    watcher.abort();
}
