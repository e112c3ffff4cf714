use crate::types::*;
use serde::{Deserialize, Serialize};

/// Messages a collaborator sends on the club socket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinSession {
        session_id: SessionId,
        display_name: String,
    },
    PushUpdate {
        update: Update,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full snapshot sent only to the connection that joined
    SessionHydrated {
        session: Session,
    },
    /// Full snapshot broadcast to every connection in the session group
    SessionUpdated {
        session: Session,
    },
    /// One algorithm step on the algorithm socket
    Step(StepRecord),
    /// The run finished on its own (not sent after cancellation)
    Complete,
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    pub fn internal_error() -> Self {
        Self::Error {
            code: "INTERNAL_ERROR".to_string(),
            msg: "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_join() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"t":"join_session","session_id":"weekly-lab","display_name":"Lead"}"#,
        )
        .unwrap();

        match msg {
            ClientMessage::JoinSession {
                session_id,
                display_name,
            } => {
                assert_eq!(session_id, "weekly-lab");
                assert_eq!(display_name, "Lead");
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_push_update() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"t":"push_update","update":{"sessionId":"s","editorDelta":"x","author":"A"}}"#,
        )
        .unwrap();

        match msg {
            ClientMessage::PushUpdate { update } => {
                assert_eq!(update.session_id, "s");
                assert_eq!(update.editor_delta, "x");
                assert_eq!(update.output_append, None);
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_step_message_is_flat() {
        let msg = ServerMessage::Step(StepRecord {
            step_index: 3,
            state_snapshot: "{}".to_string(),
            cost: 1.5,
            heuristic: 2.0,
        });
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["t"], "step");
        assert_eq!(json["stepIndex"], 3);
        assert_eq!(json["stateSnapshot"], "{}");
        assert_eq!(json["cost"], 1.5);
        assert_eq!(json["heuristic"], 2.0);
    }

    #[test]
    fn test_complete_tag() {
        assert_eq!(
            serde_json::to_string(&ServerMessage::Complete).unwrap(),
            r#"{"t":"complete"}"#
        );
    }
}
