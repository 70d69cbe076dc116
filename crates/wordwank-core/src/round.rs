use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One timed round of the game. The scoring service issues the identifier
/// and the shared rack; the gateway owns the timer and the active flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundState {
    pub uuid: String,
    pub rack: Vec<String>,
    pub time_left: i64,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub letter_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<PlayResult>>,
}

impl RoundState {
    pub fn new(uuid: String, rack: Vec<String>, letter_value: Option<i64>, duration_secs: i64) -> Self {
        Self {
            uuid,
            rack,
            time_left: duration_secs,
            is_active: true,
            letter_value,
            results: None,
        }
    }
}

/// A single scored play, as returned by the scoring service when a round
/// ends. Fields this gateway does not interpret (duplicate-word markers and
/// the like) are carried through `extra` untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayResult {
    pub player: String,
    pub word: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Human-readable end-of-round sentence for the top-ranked result.
/// The scoring service's ordering is trusted; the first entry is the winner.
pub fn winner_summary(results: &[PlayResult]) -> Option<String> {
    results.first().map(|w| {
        format!(
            "{} wins the game with \"{}\" for a total of {} points.",
            w.player, w.word, w.score
        )
    })
}
