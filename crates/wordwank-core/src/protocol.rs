//! JSON wire protocol.
//!
//! Every frame on the WebSocket is one `Envelope`:
//! `{"type": ..., "payload": ..., "sender": ..., "timestamp": ...}`.
//! Clients send `join`, `chat`, and `play`; the gateway sends `identity`,
//! `game_start`, `timer`, `game_over`, `error`, and relayed `chat`/`play`
//! frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::round::{PlayResult, RoundState};

/// Wire message kinds. Anything unrecognized is preserved as `Unknown` so
/// the dispatcher can log what the client actually sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    // Client -> Gateway
    Join,
    Chat,
    Play,

    // Gateway -> Client
    Identity,
    GameStart,
    Timer,
    GameOver,
    Error,

    #[serde(untagged)]
    Unknown(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
}

impl Envelope {
    pub fn new<T: Serialize>(
        kind: MessageKind,
        payload: &T,
        timestamp: i64,
    ) -> Result<Self, ProtocolError> {
        let payload =
            serde_json::to_value(payload).map_err(|e| ProtocolError::Serialize(e.to_string()))?;
        Ok(Self {
            kind,
            payload,
            sender: None,
            timestamp,
        })
    }

    pub fn with_sender(mut self, sender: &str) -> Self {
        self.sender = Some(sender.to_string());
        self
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialize(e.to_string()))
    }
}

/// Decode one inbound text frame.
pub fn decode_envelope(text: &str) -> Result<Envelope, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::Deserialize(e.to_string()))
}

#[derive(Debug)]
pub enum ProtocolError {
    Serialize(String),
    Deserialize(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialize(e) => write!(f, "serialize error: {e}"),
            Self::Deserialize(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Sent once per connection: the client's id and derived display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityPayload {
    pub id: String,
    pub name: String,
}

/// One countdown tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerPayload {
    pub time_left: i64,
}

/// Chat relayed to the sender's round, enriched with the display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatPayload {
    pub text: String,
    #[serde(rename = "senderName")]
    pub sender_name: String,
}

/// A `play` request payload from a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayRequest {
    pub word: String,
}

/// An accepted play fanned out to the round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayBroadcast {
    pub word: String,
    pub score: i64,
    #[serde(rename = "playerName")]
    pub player_name: String,
}

/// Final results plus the winner summary sentence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameOverPayload {
    pub results: Vec<PlayResult>,
    pub summary: String,
}

/// The full-state payload for `game_start` frames is the round itself.
pub type RoundSnapshot = RoundState;
