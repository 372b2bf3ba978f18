use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};

/// Configuration for a client-side chat session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket URL of the relay's push channel.
    pub server_url: String,

    /// Base HTTP URL of the relay (history and health endpoints).
    pub http_url: String,

    /// Base URL of the secondary realtime store. When absent the session
    /// runs on the push channel alone and a disconnected submit fails.
    pub mirror_url: Option<String>,

    /// Fixed reconnect backoff after a channel close, in milliseconds.
    pub reconnect_delay_ms: u64,

    /// Delay before the duplicate re-check that follows each live arrival.
    pub recheck_delay_ms: u64,

    /// Re-checks are discarded for messages older than this window.
    pub recheck_window_ms: i64,

    /// A pending local echo is replaced by a canonical arrival with the
    /// same text and author only inside this window.
    pub echo_window_ms: i64,

    /// Number of messages fetched from each history source at start-up.
    pub history_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ClientConfig {
    /// Generates the default configuration.
    pub fn with_defaults() -> Self {
        Self {
            server_url: "ws://localhost:8080/ws".to_string(),
            http_url: "http://localhost:8080".to_string(),
            mirror_url: None,
            reconnect_delay_ms: 3000,
            recheck_delay_ms: 250,
            recheck_window_ms: 30_000,
            echo_window_ms: 10_000,
            history_limit: 100,
        }
    }

    /// Loads the configuration from a file, environment variables, or
    /// defaults.
    ///
    /// # Arguments
    /// * `config_path` - Optional path to a YAML or JSON configuration file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if
    /// validation fails.
    pub fn load_config(config_path: Option<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = ClientConfig::with_defaults();

        if let Some(path) = config_path {
            let content = fs::read_to_string(&path)?;
            config = match path.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => serde_yml::from_str(&content)?,
                Some("json") => serde_json::from_str(&content)?,
                _ => return Err("Unsupported configuration format. Use 'yaml' or 'json'.".into()),
            };
        }

        let defaults = ClientConfig::with_defaults();

        if config.server_url == defaults.server_url {
            if let Ok(url) = env::var("DRIFTCHAT_SERVER_URL") {
                config.server_url = url;
            }
        }
        if config.http_url == defaults.http_url {
            if let Ok(url) = env::var("DRIFTCHAT_HTTP_URL") {
                config.http_url = url;
            }
        }
        if config.mirror_url.is_none() {
            if let Ok(url) = env::var("DRIFTCHAT_MIRROR_URL") {
                config.mirror_url = Some(url);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the resolved configuration.
    ///
    /// # Errors
    /// Returns the first violated constraint as an error message.
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.server_url.is_empty() || self.http_url.is_empty() {
            return Err("Server URLs must not be empty.".into());
        }
        if self.reconnect_delay_ms == 0 {
            return Err("Invalid reconnect delay. Must be greater than 0.".into());
        }
        if self.echo_window_ms <= 0 || self.recheck_window_ms <= 0 {
            return Err("Dedup windows must be greater than 0.".into());
        }
        if self.history_limit == 0 {
            return Err("Invalid history limit. Must be greater than 0.".into());
        }
        Ok(())
    }
}
