//! `WsConnector` against an in-process axum WebSocket server.

mod common;

use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{RawQuery, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use common::{eventually, frame_json, spawn_server};
use laneguard_client::client::{ws_base_from_http, WsConnector};
use laneguard_client::stream::StreamManager;
use laneguard_core::params::StreamParams;
use laneguard_core::types::ConnectionState;
use laneguard_core::RiskLevel;

#[derive(Clone, Default)]
struct ServerState {
    queries: Arc<Mutex<Vec<String>>>,
    hang_up: bool,
}

async fn realtime(
    ws: WebSocketUpgrade,
    RawQuery(query): RawQuery,
    State(state): State<ServerState>,
) -> impl IntoResponse {
    state.queries.lock().unwrap().push(query.unwrap_or_default());
    ws.on_upgrade(move |socket| serve_frames(socket, state.hang_up))
}

async fn serve_frames(mut socket: WebSocket, hang_up: bool) {
    let _ = socket.send(Message::Text("not a frame".into())).await;
    let _ = socket.send(Message::Text(frame_json(42).into())).await;
    if hang_up {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    while let Some(Ok(message)) = socket.recv().await {
        if matches!(message, Message::Close(_)) {
            break;
        }
    }
}

async fn start(hang_up: bool) -> (String, ServerState) {
    let state = ServerState {
        hang_up,
        ..ServerState::default()
    };
    let app = Router::new()
        .route("/ws/realtime", get(realtime))
        .with_state(state.clone());
    let http = spawn_server(app).await;
    (ws_base_from_http(&http), state)
}

// ---------------------------------------------------------------------------
// Test: frames flow from the server into the latest slot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn receives_frames_over_websocket() {
    let (ws_base, state) = start(false).await;
    let mut manager = StreamManager::new(Arc::new(WsConnector), ws_base);

    let params = StreamParams {
        source_index: 1,
        sample_stride: 2,
        ..StreamParams::default()
    };
    manager.set_params(params).await.unwrap();

    eventually(|| manager.latest().is_some()).await;
    let latest = manager.latest().unwrap();
    assert_eq!(latest.frame_id, Some(42));
    assert_eq!(latest.detections[0].risk_level, RiskLevel::Danger);
    assert_eq!(manager.connection_state(), ConnectionState::Connected);

    let queries = state.queries.lock().unwrap().clone();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].contains("src=1"));
    assert!(queries[0].contains("sampled_every_n_frames=2"));

    manager.shutdown().await;
    assert_eq!(manager.connection_state(), ConnectionState::Disconnected);
}

// ---------------------------------------------------------------------------
// Test: a server-side close ends in `disconnected` with no retry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn server_close_disconnects() {
    let (ws_base, state) = start(true).await;
    let mut manager = StreamManager::new(Arc::new(WsConnector), ws_base);

    manager.set_params(StreamParams::default()).await.unwrap();

    eventually(|| manager.connection_state() == ConnectionState::Disconnected
        && manager.latest().is_some())
    .await;
    assert_eq!(manager.latest().unwrap().frame_id, Some(42));

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(state.queries.lock().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Test: an unreachable server reports an error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unreachable_server_reports_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut manager = StreamManager::new(Arc::new(WsConnector), format!("ws://{addr}"));
    manager.set_params(StreamParams::default()).await.unwrap();

    eventually(|| manager.last_error().is_some()).await;
    assert_eq!(manager.connection_state(), ConnectionState::Disconnected);
}
