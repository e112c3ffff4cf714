use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use clubhouse::build_router;
use clubhouse::engine::{AlgorithmRequest, Pacing, Run};
use clubhouse::protocol::{ClientMessage, ServerMessage};
use clubhouse::session::{
    bootstrap_session, CacheError, CachePolicy, MemoryCache, MemoryStore, SessionCache,
    SessionCoordinator, SessionStore, StoreError, StoredSession, STARTER_DOCUMENT,
};
use clubhouse::state::AppState;
use clubhouse::types::{Participant, Session, SortingVariant, Update};
use clubhouse::ws::{handle_message, ClubConnection};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Store whose every call fails, standing in for an unreachable database
struct DownStore;

#[async_trait]
impl SessionStore for DownStore {
    async fn load(&self, _session_id: &str) -> Result<Option<StoredSession>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn upsert(&self, _record: StoredSession) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

/// Cache whose every call fails
struct DownCache;

#[async_trait]
impl SessionCache for DownCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("timeout".to_string()))
    }

    async fn set(&self, _key: &str, _value: String, _policy: CachePolicy) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("timeout".to_string()))
    }
}

fn participant(name: &str, is_leader: bool) -> Participant {
    Participant {
        display_name: name.to_string(),
        is_leader,
    }
}

fn update(delta: &str, output: Option<&str>, author: &str) -> Update {
    Update {
        session_id: "weekly-lab".to_string(),
        editor_delta: delta.to_string(),
        output_append: output.map(str::to_string),
        author: author.to_string(),
    }
}

#[tokio::test]
async fn test_weekly_lab_scenario() {
    let coordinator = SessionCoordinator::in_memory();

    let fresh = coordinator.get_session("weekly-lab").await.unwrap();
    assert_eq!(fresh.code_document, STARTER_DOCUMENT);
    assert!(fresh.participants.is_empty());
    assert_eq!(fresh.console_output, "");

    let first = coordinator
        .apply_update(update(r#"{"fullText":"print(1)"}"#, None, "Lead"))
        .await
        .unwrap();
    assert_eq!(first.code_document, "print(1)");
    assert_eq!(first.participants, vec![participant("Lead", true)]);

    let second = coordinator
        .apply_update(update("", Some("1"), "Guest"))
        .await
        .unwrap();
    assert_eq!(second.code_document, "print(1)");
    assert!(second.console_output.ends_with('1'));
    assert_eq!(second.console_output, "\n1");
    assert_eq!(
        second.participants,
        vec![participant("Lead", true), participant("Guest", false)]
    );

    // Read path agrees with what the write path returned
    assert_eq!(coordinator.get_session("weekly-lab").await.unwrap(), second);
}

#[tokio::test]
async fn test_leader_is_first_author_only() {
    let coordinator = SessionCoordinator::in_memory();
    for author in ["First", "Second", "third", "FIRST"] {
        coordinator
            .apply_update(update("", None, author))
            .await
            .unwrap();
    }

    let session = coordinator.get_session("weekly-lab").await.unwrap();
    assert_eq!(
        session.participants,
        vec![
            participant("First", true),
            participant("Second", false),
            participant("third", false),
        ]
    );
}

#[tokio::test]
async fn test_store_outage_is_fatal() {
    let coordinator = SessionCoordinator::new(
        Arc::new(MemoryCache::new()),
        Arc::new(DownStore),
        CachePolicy::default(),
    );

    assert!(coordinator.get_session("weekly-lab").await.is_err());
    assert!(coordinator
        .apply_update(update("x", None, "Lead"))
        .await
        .is_err());
}

#[tokio::test]
async fn test_cache_outage_degrades_to_store() {
    let store = Arc::new(MemoryStore::new());
    let coordinator =
        SessionCoordinator::new(Arc::new(DownCache), store.clone(), CachePolicy::default());

    assert_eq!(
        coordinator.get_session("weekly-lab").await.unwrap(),
        bootstrap_session("weekly-lab")
    );

    let session = coordinator
        .apply_update(update("body", None, "Lead"))
        .await
        .unwrap();
    assert_eq!(session.code_document, "body");

    // The durable copy still received the write
    let stored = store.load("weekly-lab").await.unwrap().unwrap();
    assert_eq!(stored.into_session(), session);
}

#[tokio::test]
async fn test_cached_bootstrap_survives_store_outage_for_reads() {
    // A session already warm in the cache is served without touching the store
    let cache = Arc::new(MemoryCache::new());
    let warm = SessionCoordinator::new(
        cache.clone(),
        Arc::new(MemoryStore::new()),
        CachePolicy::default(),
    );
    warm.get_session("weekly-lab").await.unwrap();

    let degraded = SessionCoordinator::new(cache, Arc::new(DownStore), CachePolicy::default());
    assert!(degraded.get_session("weekly-lab").await.is_ok());
}

#[tokio::test]
async fn test_updates_fan_out_to_every_group_member() {
    let state = Arc::new(AppState::in_memory());

    let (lead_tx, mut lead_rx) = mpsc::unbounded_channel();
    let (guest_tx, mut guest_rx) = mpsc::unbounded_channel();
    let (other_tx, mut other_rx) = mpsc::unbounded_channel();
    let mut lead = ClubConnection::new("lead".to_string(), lead_tx);
    let mut guest = ClubConnection::new("guest".to_string(), guest_tx);
    let mut other = ClubConnection::new("other".to_string(), other_tx);

    for (connection, session_id, name) in [
        (&mut lead, "weekly-lab", "Lead"),
        (&mut guest, "weekly-lab", "Guest"),
        (&mut other, "another-lab", "Other"),
    ] {
        let reply = handle_message(
            ClientMessage::JoinSession {
                session_id: session_id.to_string(),
                display_name: name.to_string(),
            },
            connection,
            &state,
        )
        .await;
        assert!(matches!(
            reply,
            Some(ServerMessage::SessionHydrated { .. })
        ));
    }

    let reply = handle_message(
        ClientMessage::PushUpdate {
            update: update(r#"{"fullText":"print(1)"}"#, None, "Lead"),
        },
        &mut lead,
        &state,
    )
    .await;
    assert!(reply.is_none());

    let expected = Session {
        session_id: "weekly-lab".to_string(),
        code_document: "print(1)".to_string(),
        console_output: String::new(),
        participants: vec![participant("Lead", true)],
    };

    for rx in [&mut lead_rx, &mut guest_rx] {
        match rx.recv().await {
            Some(ServerMessage::SessionUpdated { session }) => assert_eq!(session, expected),
            other => panic!("Expected SessionUpdated, got {:?}", other),
        }
    }

    // Different session, no broadcast
    tokio::task::yield_now().await;
    assert!(other_rx.try_recv().is_err());

    // A late joiner is hydrated with the latest snapshot
    let (late_tx, _late_rx) = mpsc::unbounded_channel();
    let mut late = ClubConnection::new("late".to_string(), late_tx);
    let reply = handle_message(
        ClientMessage::JoinSession {
            session_id: "weekly-lab".to_string(),
            display_name: "Late".to_string(),
        },
        &mut late,
        &state,
    )
    .await;
    assert_eq!(
        reply,
        Some(ServerMessage::SessionHydrated { session: expected })
    );
}

#[tokio::test]
async fn test_push_update_reports_generic_error_on_store_outage() {
    let coordinator = SessionCoordinator::new(
        Arc::new(MemoryCache::new()),
        Arc::new(DownStore),
        CachePolicy::default(),
    );
    let state = Arc::new(AppState::new(coordinator, Pacing::none()));
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut connection = ClubConnection::new("c".to_string(), tx);

    let reply = handle_message(
        ClientMessage::PushUpdate {
            update: update("x", None, "Lead"),
        },
        &mut connection,
        &state,
    )
    .await;

    assert_eq!(reply, Some(ServerMessage::internal_error()));
}

#[tokio::test]
async fn test_http_get_session() {
    let state = Arc::new(AppState::in_memory());
    state
        .coordinator
        .apply_update(update("print(2)", Some("2"), "Lead"))
        .await
        .unwrap();

    let response = build_router(state)
        .oneshot(
            Request::builder()
                .uri("/api/club/weekly-lab")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["sessionId"], "weekly-lab");
    assert_eq!(json["codeDocument"], "print(2)");
    assert_eq!(json["consoleOutput"], "\n2");
    assert_eq!(json["participants"][0]["displayName"], "Lead");
    assert_eq!(json["participants"][0]["isLeader"], true);
}

#[tokio::test]
async fn test_http_get_session_store_outage_is_500() {
    let coordinator = SessionCoordinator::new(
        Arc::new(MemoryCache::new()),
        Arc::new(DownStore),
        CachePolicy::default(),
    );
    let state = Arc::new(AppState::new(coordinator, Pacing::none()));

    let response = build_router(state)
        .oneshot(
            Request::builder()
                .uri("/api/club/weekly-lab")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(!String::from_utf8_lossy(&body).contains("connection refused"));
}

#[tokio::test]
async fn test_health() {
    let response = build_router(Arc::new(AppState::in_memory()))
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn test_independent_runs_do_not_share_generators() {
    // Interleaving two runs must not change either sequence
    let request = AlgorithmRequest::Sorting(SortingVariant::QuickSort);
    let solo_a: Vec<_> = Run::new(request, 1).map(|s| s.to_record()).collect();
    let solo_b: Vec<_> = Run::new(request, 2).map(|s| s.to_record()).collect();

    let mut a = Run::new(request, 1);
    let mut b = Run::new(request, 2);
    let (mut got_a, mut got_b) = (Vec::new(), Vec::new());
    loop {
        let next_a = a.next();
        let next_b = b.next();
        if next_a.is_none() && next_b.is_none() {
            break;
        }
        got_a.extend(next_a.map(|s| s.to_record()));
        got_b.extend(next_b.map(|s| s.to_record()));
    }

    assert_eq!(got_a, solo_a);
    assert_eq!(got_b, solo_b);
}
