//! # Reaction Flow End-to-End Tests
//!
//! Drives the full client stack (transport + channel + reconciliation)
//! against an in-process stub of the presentation service. The stub speaks
//! the documented contract: three REST endpoints plus a per-presentation
//! WebSocket that persists reactions and broadcasts a change trigger to
//! every subscriber.
//!
//! An extra `/debug/push/{id}/` route lets the runner inject arbitrary raw
//! frames, which is how the malformed-frame scenario is exercised.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tokio::sync::broadcast;

use lib_reactions::{
    ChannelError, ChannelEvent, ChannelManager, ReactionType, Reconciler, SnapshotStore,
    TransportClient,
};

#[derive(Debug, Clone, Default)]
struct Record {
    title: String,
    description: String,
    thumbs_up: u64,
    heart: u64,
    laugh: u64,
    surprise: u64,
}

impl Record {
    fn total(&self) -> u64 {
        self.thumbs_up + self.heart + self.laugh + self.surprise
    }
}

#[derive(Clone)]
struct StubState {
    presentations: Arc<Mutex<HashMap<String, Record>>>,
    // (presentation id, raw frame) fanned out to every channel subscriber
    notify_tx: broadcast::Sender<(String, String)>,
}

impl StubState {
    fn new() -> Self {
        let (notify_tx, _) = broadcast::channel(256);
        Self {
            presentations: Arc::new(Mutex::new(HashMap::new())),
            notify_tx,
        }
    }

    fn apply_reaction(&self, id: &str, reaction: &str) -> bool {
        let mut presentations = self.presentations.lock().unwrap();
        let Some(record) = presentations.get_mut(id) else {
            return false;
        };
        match reaction {
            "thumbs_up" => record.thumbs_up += 1,
            "heart" => record.heart += 1,
            "laugh" => record.laugh += 1,
            "surprise" => record.surprise += 1,
            _ => return false,
        }
        true
    }
}

async fn create_handler(State(state): State<StubState>, Json(body): Json<Value>) -> Json<Value> {
    let title = body.get("title").and_then(Value::as_str).unwrap_or("");
    if title.is_empty() {
        return Json(serde_json::json!({ "success": false, "error": "title is required" }));
    }
    let description = body
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let mut presentations = state.presentations.lock().unwrap();
    let id = format!("P{}", presentations.len() + 1);
    presentations.insert(
        id.clone(),
        Record {
            title: title.to_string(),
            description: description.clone(),
            ..Default::default()
        },
    );
    Json(serde_json::json!({
        "success": true,
        "id": id,
        "title": title,
        "description": description,
    }))
}

async fn get_handler(State(state): State<StubState>, Path(id): Path<String>) -> Json<Value> {
    match state.presentations.lock().unwrap().get(&id) {
        Some(record) => Json(serde_json::json!({
            "success": true,
            "id": id,
            "title": record.title,
            "description": record.description,
            "created_at": "2026-08-30T00:00:00Z",
            "thumbs_up": record.thumbs_up,
            "heart": record.heart,
            "laugh": record.laugh,
            "surprise": record.surprise,
        })),
        None => Json(serde_json::json!({ "success": false, "error": "presentation not found" })),
    }
}

async fn react_handler(
    State(state): State<StubState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let reaction = body
        .get("reaction_type")
        .and_then(Value::as_str)
        .unwrap_or("");
    if !state.apply_reaction(&id, reaction) {
        return Json(serde_json::json!({ "success": false, "error": "invalid reaction or id" }));
    }
    let _ = state
        .notify_tx
        .send((id.clone(), format!(r#"{{"reaction_type":"{}"}}"#, reaction)));
    Json(serde_json::json!({ "success": true, "id": id }))
}

/// Test-only injection point: broadcasts the raw request body verbatim to
/// all channel subscribers of the presentation.
async fn debug_push_handler(
    State(state): State<StubState>,
    Path(id): Path<String>,
    body: String,
) -> Json<Value> {
    let _ = state.notify_tx.send((id, body));
    Json(serde_json::json!({ "success": true }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(state): State<StubState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, id, state))
}

async fn handle_socket(mut socket: WebSocket, id: String, state: StubState) {
    let mut notify_rx = state.notify_tx.subscribe();
    loop {
        tokio::select! {
            msg = socket.recv() => match msg {
                Some(Ok(WsMessage::Text(text))) => {
                    let reaction = serde_json::from_str::<Value>(text.as_str())
                        .ok()
                        .and_then(|v| v.get("reaction_type").and_then(Value::as_str).map(String::from));
                    if let Some(reaction) = reaction {
                        if state.apply_reaction(&id, &reaction) {
                            let _ = state.notify_tx.send((
                                id.clone(),
                                format!(r#"{{"reaction_type":"{}"}}"#, reaction),
                            ));
                        }
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
            note = notify_rx.recv() => match note {
                Ok((target, frame)) => {
                    if target == id && socket.send(WsMessage::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    }
}

async fn spawn_stub() -> (SocketAddr, StubState) {
    let state = StubState::new();
    let app = Router::new()
        .route("/presentations/create/", post(create_handler))
        .route("/presentations/{id}/", get(get_handler))
        .route("/presentations/{id}/reactions/", post(react_handler))
        .route("/debug/push/{id}/", post(debug_push_handler))
        .route("/ws/presentations/{id}/", get(ws_handler))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

async fn next_event(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<ChannelEvent>,
) -> ChannelEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for channel event")
        .expect("event stream ended unexpectedly")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (addr, stub) = spawn_stub().await;
    let api = Arc::new(TransportClient::new(&format!("http://{}", addr))?);

    println!("--- Starting Reaction Flow Tests ---");

    // --- TEST 1: Create/get round trip ---
    println!("\n[Test 1] create -> get round trip...");
    let created = api.create_presentation("Demo", Some("")).await?;
    let snapshot = api.get_presentation(&created.id).await?;
    assert_eq!(snapshot.title, "Demo");
    assert_eq!(snapshot.description, "");
    assert_eq!(snapshot.total_reactions(), 0);
    println!("✅ Round trip OK: {}", created.id);

    // --- TEST 2: Scenario P1 — heart over the channel, then reconcile ---
    println!("\n[Test 2] heart over channel, reconciled snapshot...");
    let store = Arc::new(SnapshotStore::new());
    let reconciler = Reconciler::new(Arc::clone(&api), created.id.clone(), Arc::clone(&store));
    reconciler.initial_load().await?;

    let mut manager = ChannelManager::new(&format!("ws://{}", addr))?;
    let (session, mut events) = manager.open(&created.id).await;
    assert!(matches!(next_event(&mut events).await, ChannelEvent::Opened));

    session.send(ReactionType::Heart);
    assert!(matches!(next_event(&mut events).await, ChannelEvent::Frame(_)));
    reconciler.reconcile_now().await?;
    let snapshot = store.current().unwrap();
    assert_eq!(snapshot.heart, 1);
    assert_eq!(snapshot.thumbs_up, 0);
    assert_eq!(snapshot.laugh, 0);
    assert_eq!(snapshot.surprise, 0);
    println!("✅ heart: 1, all others 0");

    // --- TEST 3: Each reaction type increments exactly its own counter ---
    println!("\n[Test 3] every reaction type increments its own counter...");
    for reaction in ReactionType::ALL {
        let before = store.current().unwrap();
        session.send(reaction);
        assert!(matches!(next_event(&mut events).await, ChannelEvent::Frame(_)));
        reconciler.reconcile_now().await?;
        let after = store.current().unwrap();
        assert_eq!(after.count(reaction), before.count(reaction) + 1);
        for other in ReactionType::ALL {
            if other != reaction {
                assert_eq!(after.count(other), before.count(other));
            }
        }
    }
    println!("✅ All four counters move independently");

    // --- TEST 4: Two rapid thumbs_up, one reconciliation ---
    println!("\n[Test 4] two rapid thumbs_up, single reconcile...");
    let before = store.current().unwrap();
    session.send(ReactionType::ThumbsUp);
    session.send(ReactionType::ThumbsUp);
    assert!(matches!(next_event(&mut events).await, ChannelEvent::Frame(_)));
    assert!(matches!(next_event(&mut events).await, ChannelEvent::Frame(_)));
    reconciler.reconcile_now().await?;
    let after = store.current().unwrap();
    assert_eq!(after.thumbs_up, before.thumbs_up + 2);
    println!("✅ thumbs_up advanced by 2 (not coalesced server-side)");

    // --- TEST 5: Malformed frame does not kill the session ---
    println!("\n[Test 5] malformed frame tolerance...");
    push_raw(addr, &created.id, "certainly not json").await?;
    assert!(matches!(
        next_event(&mut events).await,
        ChannelEvent::Error(ChannelError::Malformed(_))
    ));
    session.send(ReactionType::Laugh);
    assert!(matches!(next_event(&mut events).await, ChannelEvent::Frame(_)));
    println!("✅ Session survived and kept delivering");

    // --- TEST 6: send after close has no server-observable effect ---
    println!("\n[Test 6] send after close transmits nothing...");
    let total_before = stub
        .presentations
        .lock()
        .unwrap()
        .get(&created.id)
        .unwrap()
        .total();
    session.close().await;
    session.send(ReactionType::Surprise);
    tokio::time::sleep(Duration::from_millis(300)).await;
    let total_after = stub
        .presentations
        .lock()
        .unwrap()
        .get(&created.id)
        .unwrap()
        .total();
    assert_eq!(total_before, total_after);
    println!("✅ No transmission after close");

    println!("\n--- All Tests Passed Successfully ---");
    Ok(())
}

/// Posts a raw body to the stub's debug push route, which broadcasts it
/// verbatim to every channel subscriber of the presentation.
async fn push_raw(
    addr: SocketAddr,
    id: &str,
    body: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    reqwest::Client::new()
        .post(format!("http://{}/debug/push/{}/", addr, id))
        .body(body.to_string())
        .send()
        .await?;
    Ok(())
}
