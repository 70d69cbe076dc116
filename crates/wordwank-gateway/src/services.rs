//! HTTP clients for the collaborator services.
//!
//! The gateway owns no game rules. The scoring service issues racks and
//! judges plays, the dictionary service defines words, and the player
//! service keeps nicknames and running totals. All calls go through one
//! shared `reqwest::Client` with a hard timeout so a stuck collaborator
//! cannot wedge a round.

use reqwest::StatusCode;
use serde::Deserialize;

use wordwank_core::round::PlayResult;

use crate::config::ServicesConfig;

#[derive(Debug)]
pub enum ServiceError {
    Http(String),
    Status(StatusCode),
    Decode(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(e) => write!(f, "request failed: {e}"),
            Self::Status(code) => write!(f, "unexpected status: {code}"),
            Self::Decode(e) => write!(f, "bad response body: {e}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

/// A freshly created round as the scoring service describes it.
#[derive(Debug, Deserialize)]
pub struct NewRound {
    pub uuid: String,
    #[serde(default)]
    pub rack: Vec<String>,
    #[serde(default)]
    pub letter_value: Option<i64>,
}

/// Scoring verdict for a single play.
#[derive(Debug, Deserialize)]
pub struct PlayOutcome {
    pub score: Option<i64>,
    pub error: Option<String>,
}

pub struct ServiceClients {
    http: reqwest::Client,
    scoring_url: String,
    word_url: String,
    player_url: String,
}

impl ServiceClients {
    pub fn new(config: &ServicesConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("wordwank-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            http,
            scoring_url: config.scoring_url.trim_end_matches('/').to_string(),
            word_url: config.word_url.trim_end_matches('/').to_string(),
            player_url: config.player_url.trim_end_matches('/').to_string(),
        }
    }

    /// Ask the scoring service for a new round (id, rack, letter value).
    pub async fn create_round(&self) -> Result<NewRound, ServiceError> {
        let resp = self
            .http
            .post(format!("{}/game", self.scoring_url))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ServiceError::Status(resp.status()));
        }
        resp.json::<NewRound>()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }

    /// Submit one play for scoring. The client id travels in the
    /// Authorization header so the scoring service can attribute the play.
    pub async fn submit_play(
        &self,
        uuid: &str,
        word: &str,
        client_id: &str,
    ) -> Result<PlayOutcome, ServiceError> {
        let resp = self
            .http
            .get(format!("{}/game/{uuid}/play/{word}", self.scoring_url))
            .header("Authorization", client_id)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ServiceError::Status(resp.status()));
        }
        resp.json::<PlayOutcome>()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }

    /// Close a round on the scoring side and fetch the ranked results.
    pub async fn final_results(&self, uuid: &str) -> Result<Vec<PlayResult>, ServiceError> {
        let resp = self
            .http
            .post(format!("{}/game/{uuid}/end", self.scoring_url))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ServiceError::Status(resp.status()));
        }
        resp.json::<Vec<PlayResult>>()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }

    /// Look up a word definition. Best effort: any failure is just `None`.
    pub async fn define_word(&self, word: &str) -> Option<String> {
        let resp = match self
            .http
            .get(format!("{}/word/{word}", self.word_url))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::debug!(word, error = %e, "Definition lookup failed");
                return None;
            },
        };
        if resp.status() != StatusCode::OK {
            return None;
        }
        resp.text().await.ok().filter(|t| !t.is_empty())
    }

    /// Tell the player service about a connected player. Fire and forget;
    /// failures are logged and swallowed.
    pub async fn register_player(&self, client_id: &str, name: &str) {
        let result = self
            .http
            .post(format!("{}/players/{client_id}", self.player_url))
            .form(&[("username", name)])
            .send()
            .await;
        match result {
            Ok(resp) if !resp.status().is_success() => {
                tracing::warn!(client_id, status = %resp.status(), "Player registration rejected");
            },
            Ok(_) => {},
            Err(e) => {
                tracing::warn!(client_id, error = %e, "Player registration failed");
            },
        }
    }

    /// Report a round score to the player service's running total.
    pub async fn report_score(&self, client_id: &str, score: i64) {
        let result = self
            .http
            .post(format!("{}/players/{client_id}/score", self.player_url))
            .form(&[("score", score.to_string())])
            .send()
            .await;
        match result {
            Ok(resp) if !resp.status().is_success() => {
                tracing::warn!(client_id, status = %resp.status(), "Score report rejected");
            },
            Ok(_) => {},
            Err(e) => {
                tracing::warn!(client_id, error = %e, "Score report failed");
            },
        }
    }
}
