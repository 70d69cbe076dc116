use serde::Deserialize;

/// Top-level gateway configuration, loaded from `wordwank.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub listen_addr: String,
    pub rounds: RoundsConfig,
    pub services: ServicesConfig,
    pub limits: LimitsConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8081".to_string(),
            rounds: RoundsConfig::default(),
            services: ServicesConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// Round lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoundsConfig {
    /// Maximum players assigned to one round by matchmaking.
    pub max_players: usize,
    /// Countdown duration for a fresh round, in seconds.
    pub duration_secs: i64,
    /// How long an ended round stays readable before it is purged.
    pub purge_delay_secs: u64,
    /// Delay before the startup task creates the first round, giving the
    /// scoring service time to come up.
    pub bootstrap_delay_secs: u64,
}

impl Default for RoundsConfig {
    fn default() -> Self {
        Self {
            max_players: 10,
            duration_secs: 30,
            purge_delay_secs: 30,
            bootstrap_delay_secs: 5,
        }
    }
}

/// Base URLs and timeout for the collaborator services.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Scoring service: issues racks and round ids, scores plays.
    pub scoring_url: String,
    /// Dictionary service: word definitions.
    pub word_url: String,
    /// Player identity service: nicknames and score totals.
    pub player_url: String,
    /// Client-side timeout applied to every collaborator call.
    pub request_timeout_secs: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            scoring_url: "http://tilemasters:3883".to_string(),
            word_url: "http://wordd:2345".to_string(),
            player_url: "http://playerd:8080".to_string(),
            request_timeout_secs: 5,
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    /// Outbound message buffer per client; slow clients past this are skipped.
    pub client_message_buffer: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            client_message_buffer: 256,
        }
    }
}

impl GatewayConfig {
    /// Validate configuration, exiting on values the gateway cannot run with.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }
        if self.rounds.max_players == 0 {
            tracing::error!("rounds.max_players must be > 0");
            std::process::exit(1);
        }
        if self.rounds.duration_secs <= 0 {
            tracing::error!("rounds.duration_secs must be > 0");
            std::process::exit(1);
        }
        if self.services.request_timeout_secs == 0 {
            tracing::error!("services.request_timeout_secs must be > 0");
            std::process::exit(1);
        }
        if self.limits.max_ws_connections == 0 {
            tracing::error!("limits.max_ws_connections must be > 0");
            std::process::exit(1);
        }
        if self.limits.client_message_buffer == 0 {
            tracing::error!("limits.client_message_buffer must be > 0");
            std::process::exit(1);
        }
    }

    /// Load config from `wordwank.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("wordwank.toml") {
            Ok(content) => match toml::from_str::<GatewayConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from wordwank.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse wordwank.toml: {e}, using defaults");
                    GatewayConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No wordwank.toml found, using defaults");
                GatewayConfig::default()
            },
        };

        // Environment variable overrides
        if let Ok(addr) = std::env::var("WORDWANK_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(url) = std::env::var("WORDWANK_SCORING_URL")
            && !url.is_empty()
        {
            config.services.scoring_url = url;
        }
        if let Ok(url) = std::env::var("WORDWANK_WORD_URL")
            && !url.is_empty()
        {
            config.services.word_url = url;
        }
        if let Ok(url) = std::env::var("WORDWANK_PLAYER_URL")
            && !url.is_empty()
        {
            config.services.player_url = url;
        }
        if let Ok(val) = std::env::var("WORDWANK_MAX_PLAYERS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.rounds.max_players = n;
        }
        if let Ok(val) = std::env::var("WORDWANK_ROUND_DURATION")
            && let Ok(n) = val.parse::<i64>()
        {
            config.rounds.duration_secs = n;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:8081");
        assert_eq!(cfg.rounds.max_players, 10);
        assert_eq!(cfg.rounds.duration_secs, 30);
        assert_eq!(cfg.rounds.purge_delay_secs, 30);
        assert_eq!(cfg.services.request_timeout_secs, 5);
    }

    #[test]
    fn parse_minimal_toml() {
        let toml_str = r#"
listen_addr = "127.0.0.1:9090"

[rounds]
max_players = 4
"#;
        let cfg: GatewayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:9090");
        assert_eq!(cfg.rounds.max_players, 4);
        // Unspecified sections keep their defaults
        assert_eq!(cfg.rounds.duration_secs, 30);
        assert_eq!(cfg.limits.max_ws_connections, 200);
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
listen_addr = "0.0.0.0:3000"

[rounds]
max_players = 6
duration_secs = 60
purge_delay_secs = 10
bootstrap_delay_secs = 1

[services]
scoring_url = "http://localhost:3883"
word_url = "http://localhost:2345"
player_url = "http://localhost:8080"
request_timeout_secs = 2

[limits]
max_ws_connections = 50
client_message_buffer = 64
"#;
        let cfg: GatewayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.rounds.duration_secs, 60);
        assert_eq!(cfg.services.scoring_url, "http://localhost:3883");
        assert_eq!(cfg.services.request_timeout_secs, 2);
        assert_eq!(cfg.limits.max_ws_connections, 50);
        assert_eq!(cfg.limits.client_message_buffer, 64);
    }

    #[test]
    fn validate_accepts_default_config() {
        GatewayConfig::default().validate();
    }

    #[test]
    fn validate_rejects_invalid_addr() {
        let cfg = GatewayConfig {
            listen_addr: "not-an-address".to_string(),
            ..GatewayConfig::default()
        };
        // validate() calls process::exit, so we test the underlying check
        assert!(cfg.listen_addr.parse::<std::net::SocketAddr>().is_err());
    }
}
