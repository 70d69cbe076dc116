//! WebSocket admission and the per-connection read/write loops.
//!
//! Each connection gets a bounded outbound channel drained by a writer task.
//! All frames the gateway originates are encoded before touching the
//! registry lock, and the lock is released before any await on the socket.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use wordwank_core::naming::display_name;
use wordwank_core::protocol::{
    ChatPayload, Envelope, IdentityPayload, MessageKind, PlayBroadcast, PlayRequest,
    decode_envelope,
};
use wordwank_core::time::timestamp_now;

use crate::rounds;
use crate::state::{AppState, ConnectionGuard};

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub id: Option<String>,
}

/// `GET /ws?id=<client_id>`. Refuses the upgrade outright when the
/// connection cap is reached; synthesizes an id for anonymous clients.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    State(state): State<AppState>,
) -> Response {
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= state.config.limits.max_ws_connections {
        tracing::warn!(current, "Refusing WebSocket connection, at capacity");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let client_id = match query.id {
        Some(id) if !id.is_empty() => id,
        _ => format!("anon-{}", Uuid::new_v4().simple()),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, client_id: String) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let name = display_name(&client_id);
    tracing::info!(client_id = %client_id, name = %name, "Client connected");

    // Fire-and-forget identity registration with the player service.
    {
        let services = Arc::clone(&state.services);
        let id = client_id.clone();
        let player_name = name.clone();
        tokio::spawn(async move { services.register_player(&id, &player_name).await });
    }

    let (sink, stream) = socket.split();
    let (tx, rx) = mpsc::channel::<Utf8Bytes>(state.config.limits.client_message_buffer);

    let conn_id = {
        let mut registry = state.registry.write().await;
        registry.set_display_name(&client_id, &name);
        registry.register_client(&client_id, tx)
    };
    tokio::spawn(write_loop(sink, rx));

    let assigned = rounds::assign(&state, &client_id).await;

    send_envelope(
        &state,
        &client_id,
        MessageKind::Identity,
        &IdentityPayload {
            id: client_id.clone(),
            name: name.clone(),
        },
    )
    .await;

    match assigned {
        Ok(uuid) => {
            let snapshot = state.registry.read().await.round_snapshot(&uuid);
            if let Some(snapshot) = snapshot
                && snapshot.is_active
            {
                send_envelope(&state, &client_id, MessageKind::GameStart, &snapshot).await;
            }
        },
        Err(e) => {
            tracing::warn!(client_id = %client_id, error = %e, "Matchmaking failed on connect");
            send_error(&state, &client_id, &e).await;
        },
    }

    read_loop(stream, &state, &client_id).await;

    state
        .registry
        .write()
        .await
        .unregister_client(&client_id, conn_id);
    tracing::info!(client_id = %client_id, "Client disconnected");
}

/// Drain the outbound channel into the socket. Ends when the channel closes,
/// either on disconnect cleanup or when a reconnect evicts this connection;
/// closing the sink tears the old socket down in the eviction case.
async fn write_loop(mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Utf8Bytes>) {
    while let Some(frame) = rx.recv().await {
        if sink.send(Message::Text(frame)).await.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
}

async fn read_loop(mut stream: SplitStream<WebSocket>, state: &AppState, client_id: &str) {
    while let Some(msg) = stream.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(client_id, error = %e, "WebSocket read error");
                break;
            },
        };
        match msg {
            Message::Text(text) => handle_frame(state, client_id, text.as_str()).await,
            Message::Close(_) => break,
            // Ping/pong is answered by axum; binary frames are not part of
            // the protocol.
            _ => {},
        }
    }
}

async fn handle_frame(state: &AppState, client_id: &str, text: &str) {
    let envelope = match decode_envelope(text) {
        Ok(env) => env,
        Err(e) => {
            tracing::warn!(client_id, error = %e, "Dropping malformed frame");
            return;
        },
    };
    match envelope.kind {
        MessageKind::Join => handle_join(state, client_id).await,
        MessageKind::Chat => handle_chat(state, client_id, envelope.payload).await,
        MessageKind::Play => handle_play(state, client_id, envelope.payload).await,
        other => {
            tracing::warn!(client_id, kind = ?other, "Ignoring unexpected message kind");
        },
    }
}

async fn handle_join(state: &AppState, client_id: &str) {
    match rounds::assign(state, client_id).await {
        Ok(uuid) => {
            let snapshot = state.registry.read().await.round_snapshot(&uuid);
            if let Some(snapshot) = snapshot {
                send_envelope(state, client_id, MessageKind::GameStart, &snapshot).await;
            }
        },
        Err(e) => {
            tracing::warn!(client_id, error = %e, "Join failed");
            send_error(state, client_id, &e).await;
        },
    }
}

async fn handle_chat(state: &AppState, client_id: &str, payload: Value) {
    let Some(text) = payload.as_str().map(str::to_string) else {
        tracing::warn!(client_id, "Chat payload is not a string");
        return;
    };
    let (round, sender_name) = {
        let registry = state.registry.read().await;
        (
            registry.current_round(client_id),
            registry.display_name(client_id),
        )
    };
    // Chat from a client with no round goes nowhere.
    let Some(uuid) = round else {
        tracing::debug!(client_id, "Dropping chat from client without a round");
        return;
    };
    let chat = ChatPayload {
        text,
        sender_name: sender_name.unwrap_or_else(|| display_name(client_id)),
    };
    broadcast_with_sender(state, &uuid, client_id, MessageKind::Chat, &chat).await;
}

async fn handle_play(state: &AppState, client_id: &str, payload: Value) {
    let request: PlayRequest = match serde_json::from_value(payload) {
        Ok(req) => req,
        Err(e) => {
            tracing::warn!(client_id, error = %e, "Bad play payload");
            return;
        },
    };
    let round = {
        let registry = state.registry.read().await;
        registry
            .current_round(client_id)
            .filter(|uuid| registry.round_is_active(uuid))
    };
    // Plays with no live round are dropped without a reply.
    let Some(uuid) = round else {
        tracing::debug!(client_id, word = %request.word, "Dropping play outside an active round");
        return;
    };

    match state
        .services
        .submit_play(&uuid, &request.word, client_id)
        .await
    {
        Ok(outcome) => {
            if let Some(err) = outcome.error {
                send_error(state, client_id, &err).await;
                return;
            }
            let player_name = {
                let registry = state.registry.read().await;
                registry
                    .display_name(client_id)
                    .unwrap_or_else(|| display_name(client_id))
            };
            let broadcast = PlayBroadcast {
                word: request.word,
                score: outcome.score.unwrap_or(0),
                player_name,
            };
            broadcast_with_sender(state, &uuid, client_id, MessageKind::Play, &broadcast).await;
        },
        Err(e) => {
            tracing::warn!(client_id, round = %uuid, error = %e, "Play submission failed");
        },
    }
}

/// Encode an envelope and send it to one client.
async fn send_envelope<T: Serialize>(
    state: &AppState,
    client_id: &str,
    kind: MessageKind,
    payload: &T,
) {
    let json = Envelope::new(kind, payload, timestamp_now()).and_then(|env| env.to_json());
    match json {
        Ok(json) => state.registry.read().await.send_to_client(client_id, &json),
        Err(e) => tracing::error!(client_id, error = %e, "Failed to encode frame"),
    }
}

async fn send_error(state: &AppState, client_id: &str, message: &str) {
    send_envelope(
        state,
        client_id,
        MessageKind::Error,
        &serde_json::json!({ "message": message }),
    )
    .await;
}

/// Encode an envelope carrying the originating client's id and fan it out
/// to the round.
async fn broadcast_with_sender<T: Serialize>(
    state: &AppState,
    uuid: &str,
    sender: &str,
    kind: MessageKind,
    payload: &T,
) {
    let json = Envelope::new(kind, payload, timestamp_now())
        .map(|env| env.with_sender(sender))
        .and_then(|env| env.to_json());
    match json {
        Ok(json) => state.registry.read().await.broadcast_to_round(uuid, &json),
        Err(e) => tracing::error!(round = uuid, error = %e, "Failed to encode broadcast"),
    }
}
