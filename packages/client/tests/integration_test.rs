//! Integration tests for the chat client against an in-process fake backend.
//!
//! The fake serves the two HTTP routes and a minimal Socket.IO endpoint over
//! the Engine.IO WebSocket transport; the client is configured to open the
//! WebSocket directly.

use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use chatterx_client::{
    ChatClient, ClientConfig, ClientError,
    api::HttpChatApi,
    domain::{Change, Message as ChatMessage},
    transport::{SocketIoConnection, TransportEvent},
};

const OPEN: &str = r#"0{"sid":"engine-1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
const CONNECT_ACK: &str = r#"40{"sid":"socket-1"}"#;

/// Shared state of the fake backend
#[derive(Clone, Default)]
struct Backend {
    register_hits: Arc<AtomicUsize>,
    socket_connections: Arc<AtomicUsize>,
    frames: Arc<Mutex<Vec<String>>>,
}

impl Backend {
    fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }
}

/// Helper struct to manage the fake backend lifecycle
struct TestBackend {
    addr: SocketAddr,
    backend: Backend,
    task: tokio::task::JoinHandle<()>,
}

impl TestBackend {
    /// Start the fake backend on an ephemeral port
    async fn start() -> Self {
        let backend = Backend::default();
        let app = Router::new()
            .route("/api/auth/register", post(register))
            .route("/api/messages/pull", get(pull))
            .route("/socket.io/", get(socket))
            .with_state(backend.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        TestBackend {
            addr,
            backend,
            task,
        }
    }

    fn config(&self) -> ClientConfig {
        let base = format!("http://{}", self.addr);
        ClientConfig {
            api_base: base.clone(),
            ws_base: base,
            websocket_only: true,
            ..ClientConfig::default()
        }
    }

    /// Wait until the backend has received `frame`
    async fn wait_for_frame(&self, frame: &str) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while tokio::time::Instant::now() < deadline {
            if self.backend.frames().iter().any(|f| f == frame) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!(
            "frame {} never arrived; got {:?}",
            frame,
            self.backend.frames()
        );
    }
}

impl Drop for TestBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn register(
    State(backend): State<Backend>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    backend.register_hits.fetch_add(1, Ordering::SeqCst);
    if body["username"] == "stall" {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
    if body["username"] == "reject" {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(Json(json!({"id": 7})))
}

async fn pull() -> Json<Value> {
    Json(json!({"messages": [{"sender_id": 7, "text": "hi", "timestamp": 1000}]}))
}

async fn socket(ws: WebSocketUpgrade, State(backend): State<Backend>) -> impl IntoResponse {
    backend.socket_connections.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(move |socket| serve_socket(socket, backend))
}

async fn serve_socket(mut socket: WebSocket, backend: Backend) {
    if socket.send(Message::Text(OPEN.into())).await.is_err() {
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else {
            continue;
        };
        let text = text.as_str().to_string();
        backend.frames.lock().unwrap().push(text.clone());

        let replies: Vec<String> = if text.starts_with("40") {
            vec![
                CONNECT_ACK.to_string(),
                r#"42["online_users",[{"id":7,"username":"alice"},{"id":9,"username":"bob"}]]"#
                    .to_string(),
                "2".to_string(),
            ]
        } else if let Some(body) = text.strip_prefix("42") {
            let args: Value = serde_json::from_str(body).unwrap_or(Value::Null);
            if args[0] == "send_message" {
                vec![format!("42{}", json!(["message", args[1]]))]
            } else {
                vec![]
            }
        } else if text == "41" {
            break;
        } else {
            vec![]
        };

        for reply in replies {
            if socket.send(Message::Text(reply.into())).await.is_err() {
                return;
            }
        }
    }
}

type HttpClient = ChatClient<HttpChatApi, SocketIoConnection>;

fn build_client(
    config: &ClientConfig,
) -> (HttpClient, mpsc::UnboundedReceiver<TransportEvent>) {
    let (transport_tx, transport_rx) = mpsc::unbounded_channel();
    let (timer_tx, _timer_rx) = mpsc::unbounded_channel();
    let link = SocketIoConnection::new(config.socket_url().unwrap(), transport_tx)
        .websocket_only(config.websocket_only);
    let api = HttpChatApi::new(config).expect("Failed to build HTTP client");
    let client = ChatClient::new(config, api, link, timer_tx);
    (client, transport_rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("Timed out waiting for transport event")
        .expect("Transport channel closed")
}

/// Feed transport events into the client until one produces `wanted`
async fn wait_for_change(
    client: &mut HttpClient,
    rx: &mut mpsc::UnboundedReceiver<TransportEvent>,
    wanted: Change,
) {
    loop {
        let change = client.handle_transport_event(next_event(rx).await);
        if change == wanted {
            return;
        }
    }
}

#[tokio::test]
async fn test_register_connects_and_loads_history() {
    // テスト項目: 登録すると ID が保存され、接続され、履歴がログになる
    // given (前提条件):
    let server = TestBackend::start().await;
    let (mut client, mut transport_rx) = build_client(&server.config());

    // when (操作):
    let registered = client.register("alice").await.unwrap();
    wait_for_change(&mut client, &mut transport_rx, Change::ConnectionChanged).await;

    // then (期待する結果):
    assert_eq!(registered.user_id, 7);
    assert!(client.state().session.is_connected());
    assert_eq!(
        client.state().messages(),
        &[ChatMessage {
            sender_id: Some(7),
            text: "hi".to_string(),
            timestamp: 1000,
            ..ChatMessage::default()
        }]
    );
    server.wait_for_frame(r#"40{"userId":7}"#).await;
    server
        .wait_for_frame(r#"42["auth",{"userId":7,"username":"alice"}]"#)
        .await;

    client.teardown().await;
}

#[tokio::test]
async fn test_roster_push_and_heartbeat() {
    // テスト項目: 接続後の名簿の受信と ping への pong 応答が行われる
    // given (前提条件):
    let server = TestBackend::start().await;
    let (mut client, mut transport_rx) = build_client(&server.config());
    client.register("alice").await.unwrap();

    // when (操作):
    wait_for_change(&mut client, &mut transport_rx, Change::RosterReplaced).await;

    // then (期待する結果):
    assert_eq!(client.state().roster().len(), 2);
    assert!(client.state().roster().contains(9));
    server.wait_for_frame("3").await;

    client.teardown().await;
}

#[tokio::test]
async fn test_sent_message_is_echoed_into_log() {
    // テスト項目: 送信したメッセージはサーバーからのエコーでログに追加される
    // given (前提条件):
    let server = TestBackend::start().await;
    let (mut client, mut transport_rx) = build_client(&server.config());
    client.register("alice").await.unwrap();
    wait_for_change(&mut client, &mut transport_rx, Change::RosterReplaced).await;

    // when (操作):
    client.send_message("hello", None).unwrap();
    wait_for_change(&mut client, &mut transport_rx, Change::MessageAppended).await;

    // then (期待する結果):
    let last = client.state().messages().last().unwrap();
    assert_eq!(last.text, "hello");
    assert_eq!(last.sender_id, Some(7));
    assert_eq!(last.recipient_id, None);
    assert!(client.state().is_own(last));
    server
        .wait_for_frame(r#"42["stop_typing",{"userId":7,"username":"alice"}]"#)
        .await;

    client.teardown().await;
}

#[tokio::test]
async fn test_blank_username_makes_no_request() {
    // テスト項目: 空白のユーザー名ではサーバーへのリクエストが発生しない
    // given (前提条件):
    let server = TestBackend::start().await;
    let (mut client, _transport_rx) = build_client(&server.config());

    // when (操作):
    let result = client.register("  ").await;

    // then (期待する結果):
    assert!(matches!(result, Err(ClientError::EmptyUsername)));
    assert_eq!(server.backend.register_hits.load(Ordering::SeqCst), 0);
    assert_eq!(server.backend.socket_connections.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rejected_registration_stays_unauthenticated() {
    // テスト項目: 登録がサーバーに拒否されると未登録のままで接続もしない
    // given (前提条件):
    let server = TestBackend::start().await;
    let (mut client, _transport_rx) = build_client(&server.config());

    // when (操作):
    let result = client.register("reject").await;

    // then (期待する結果):
    assert!(matches!(result, Err(ClientError::Registration(_))));
    assert!(!client.state().session.is_authenticated());
    assert_eq!(server.backend.register_hits.load(Ordering::SeqCst), 1);
    assert_eq!(server.backend.socket_connections.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_teardown_sends_disconnect() {
    // テスト項目: 終了処理で切断パケットが送られる
    // given (前提条件):
    let server = TestBackend::start().await;
    let (mut client, mut transport_rx) = build_client(&server.config());
    client.register("alice").await.unwrap();
    wait_for_change(&mut client, &mut transport_rx, Change::ConnectionChanged).await;

    // when (操作):
    client.teardown().await;

    // then (期待する結果):
    server.wait_for_frame("41").await;
    assert!(!client.state().session.is_connected());
}

#[tokio::test]
async fn test_unreachable_backend_fails_registration() {
    // テスト項目: バックエンドに到達できない場合は登録失敗になる
    // given (前提条件):
    let config = ClientConfig {
        api_base: "http://127.0.0.1:1".to_string(),
        ws_base: "http://127.0.0.1:1".to_string(),
        ..ClientConfig::default()
    };
    let (mut client, _transport_rx) = build_client(&config);

    // when (操作):
    let result = client.register("alice").await;

    // then (期待する結果):
    assert!(matches!(result, Err(ClientError::Registration(_))));
    assert!(!client.state().session.is_authenticated());
}

#[tokio::test]
async fn test_stalled_registration_times_out() {
    // テスト項目: 応答しない登録リクエストはタイムアウトで失敗し未登録のままになる
    // given (前提条件):
    let server = TestBackend::start().await;
    let config = ClientConfig {
        request_timeout: Duration::from_millis(200),
        ..server.config()
    };
    let (mut client, _transport_rx) = build_client(&config);

    // when (操作):
    let result = tokio::time::timeout(Duration::from_secs(5), client.register("stall")).await;

    // then (期待する結果):
    assert!(matches!(result, Ok(Err(ClientError::Registration(_)))));
    assert!(!client.state().session.is_authenticated());
    assert_eq!(server.backend.socket_connections.load(Ordering::SeqCst), 0);
}
