pub mod algorithm;
pub mod club;

use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::SplitSink};

use crate::protocol::ServerMessage;

pub use algorithm::{ws_algorithm_handler, AlgorithmQuery};
pub use club::{handle_message, ws_club_handler, ClubConnection};

type WsSender = SplitSink<WebSocket, Message>;

/// Serialize and send one server message. Returns false once the peer is gone.
async fn send_message(sender: &mut WsSender, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to encode server message: {}", e);
            true
        }
    }
}
