use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::{Form, Json, Router};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use wordwank_gateway::build_app;
use wordwank_gateway::config::{GatewayConfig, ServicesConfig};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Recorded traffic and scripted responses for the mock collaborators.
pub struct MockState {
    pub rounds_created: AtomicUsize,
    /// (round uuid, word, Authorization header) per scoring call.
    pub plays: Mutex<Vec<(String, String, String)>>,
    pub ended: Mutex<Vec<String>>,
    /// (client id, username) per player registration.
    pub registrations: Mutex<Vec<(String, String)>>,
    /// (client id, score) per score report.
    pub scores: Mutex<Vec<(String, String)>>,
    pub play_response: Mutex<Value>,
    pub end_results: Mutex<Value>,
    pub definition: Mutex<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            rounds_created: AtomicUsize::new(0),
            plays: Mutex::new(Vec::new()),
            ended: Mutex::new(Vec::new()),
            registrations: Mutex::new(Vec::new()),
            scores: Mutex::new(Vec::new()),
            play_response: Mutex::new(json!({ "score": 5, "error": null })),
            end_results: Mutex::new(json!([])),
            definition: Mutex::new("a small word".to_string()),
        }
    }
}

/// In-process stand-in for the scoring, dictionary, and player services.
pub struct MockServices {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockServices {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/game", post(mock_create_game))
            .route("/game/{uuid}/play/{word}", get(mock_play))
            .route("/game/{uuid}/end", post(mock_end_game))
            .route("/word/{word}", get(mock_define))
            .route("/players/{id}", post(mock_register))
            .route("/players/{id}/score", post(mock_score))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

async fn mock_create_game(State(state): State<Arc<MockState>>) -> Json<Value> {
    let n = state.rounds_created.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({
        "uuid": format!("round-{n}"),
        "rack": ["C", "A", "T", "S", "E", "R"],
        "letter_value": 10
    }))
}

async fn mock_play(
    State(state): State<Arc<MockState>>,
    Path((uuid, word)): Path<(String, String)>,
    headers: HeaderMap,
) -> Json<Value> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.plays.lock().unwrap().push((uuid, word, auth));
    Json(state.play_response.lock().unwrap().clone())
}

async fn mock_end_game(
    State(state): State<Arc<MockState>>,
    Path(uuid): Path<String>,
) -> Json<Value> {
    state.ended.lock().unwrap().push(uuid);
    Json(state.end_results.lock().unwrap().clone())
}

async fn mock_define(State(state): State<Arc<MockState>>, Path(_word): Path<String>) -> String {
    state.definition.lock().unwrap().clone()
}

async fn mock_register(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    Form(form): Form<std::collections::HashMap<String, String>>,
) {
    let username = form.get("username").cloned().unwrap_or_default();
    state.registrations.lock().unwrap().push((id, username));
}

async fn mock_score(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    Form(form): Form<std::collections::HashMap<String, String>>,
) {
    let score = form.get("score").cloned().unwrap_or_default();
    state.scores.lock().unwrap().push((id, score));
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub mock: MockServices,
    pub state: wordwank_gateway::state::AppState,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a gateway wired to fresh mock collaborators, default config.
    pub async fn start() -> Self {
        Self::with_config(GatewayConfig::default()).await
    }

    /// Start a gateway with a custom config; the collaborator URLs are
    /// always rewritten to point at the mocks.
    pub async fn with_config(mut config: GatewayConfig) -> Self {
        let mock = MockServices::start().await;
        config.services = ServicesConfig {
            scoring_url: mock.base_url(),
            word_url: mock.base_url(),
            player_url: mock.base_url(),
            request_timeout_secs: 2,
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, state) = build_app(config);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            mock,
            state,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self, client_id: &str) -> String {
        format!("ws://{}/ws?id={client_id}", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send one envelope frame.
pub async fn send_frame(stream: &mut WsStream, kind: &str, payload: Value) {
    let frame = json!({ "type": kind, "payload": payload }).to_string();
    stream.send(Message::Text(frame.into())).await.unwrap();
}

/// Read the next text frame as JSON (5s timeout).
pub async fn read_frame(stream: &mut WsStream) -> Value {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str()).unwrap();
                },
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket frame")
}

/// Read frames until one of the given kind arrives, skipping others
/// (timer ticks mostly). 10s timeout.
pub async fn read_frame_of_kind(stream: &mut WsStream, kind: &str) -> Value {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let frame = read_frame(stream).await;
            if frame["type"] == kind {
                return frame;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("Timed out waiting for a {kind} frame"))
}

/// Try to read a frame of the given kind, returning None when nothing of
/// that kind shows up within the window. Other kinds are skipped.
pub async fn try_read_frame_of_kind(
    stream: &mut WsStream,
    kind: &str,
    timeout_ms: u64,
) -> Option<Value> {
    tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    let frame: Value = serde_json::from_str(text.as_str()).unwrap();
                    if frame["type"] == kind {
                        return frame;
                    }
                },
                Some(Ok(_)) => continue,
                // Closed stream: nothing of this kind is coming, wait out
                // the window so the caller gets a clean None.
                _ => std::future::pending::<()>().await,
            }
        }
    })
    .await
    .ok()
}

/// Connect and consume the admission handshake (`identity` + `game_start`),
/// returning the stream and the assigned round uuid.
pub async fn connect_and_join(server: &TestServer, client_id: &str) -> (WsStream, String) {
    let mut stream = ws_connect(&server.ws_url(client_id)).await;
    let identity = read_frame_of_kind(&mut stream, "identity").await;
    assert_eq!(identity["payload"]["id"], client_id);
    let start = read_frame_of_kind(&mut stream, "game_start").await;
    let uuid = start["payload"]["uuid"].as_str().unwrap().to_string();
    (stream, uuid)
}
