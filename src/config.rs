//! Configuration file parser for the relay (default `feedrelay.toml`).
//!
//! Every key has a default except the ones the relay cannot guess: at least
//! one source and one channel. Unknown keys are accepted by serde and logged
//! as a warning so typos do not go unnoticed.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::util::validate_base_url;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// Parsed fine but cannot drive a relay.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Relay configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// [`Config::validate`] must pass before the values are used.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat nickname.
    pub nick: String,

    /// Chat real name / display name.
    pub name: String,

    /// Chat server address, `host:port`.
    pub server: String,

    /// Connect to the chat server over TLS.
    pub tls: bool,

    /// Destination channels; every relayed message goes to all of them.
    pub channels: Vec<String>,

    /// Feed paths polled each cycle, e.g. `/r/rust/new`.
    pub sources: Vec<String>,

    /// Seconds between poll cycles.
    pub poll_interval_secs: u64,

    /// Align the first poll to a multiple of this many seconds. 0 = off.
    pub align_interval_secs: u64,

    /// `User-Agent` header sent with every feed request.
    pub user_agent: String,

    /// Tag messages with the item's first category instead of `reddit`.
    pub show_category: bool,

    /// Feed host that source paths are appended to.
    pub base_url: String,

    /// Appended after the source path (feed format selector).
    pub feed_suffix: String,

    /// Prefix of the short link built from the item id.
    pub short_link_base: String,

    /// Pause after each delivered message, in milliseconds.
    pub send_delay_ms: u64,

    /// Outbound queue capacity. Producers wait when it is full.
    pub queue_capacity: usize,

    /// Wait between a transport error and the reconnect, in seconds.
    pub reconnect_cooldown_secs: u64,

    /// Wait between failed first-run attempts, in seconds.
    pub first_run_retry_secs: u64,

    /// Liveness probe interval in seconds. 0 disables probing.
    pub liveness_interval_secs: u64,

    /// Reconnect when a probe window saw no inbound traffic.
    pub liveness_reconnect: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nick: "feedrelay".to_string(),
            name: "feedrelay".to_string(),
            server: "irc.libera.chat:6697".to_string(),
            tls: true,
            channels: Vec::new(),
            sources: Vec::new(),
            poll_interval_secs: 60,
            align_interval_secs: 0,
            user_agent: concat!("feedrelay/", env!("CARGO_PKG_VERSION")).to_string(),
            show_category: false,
            base_url: "https://www.reddit.com".to_string(),
            feed_suffix: ".rss".to_string(),
            short_link_base: "https://redd.it/".to_string(),
            send_delay_ms: 1000,
            queue_capacity: 100,
            reconnect_cooldown_secs: 60,
            first_run_retry_secs: 600,
            liveness_interval_secs: 60,
            liveness_reconnect: false,
        }
    }
}

const KNOWN_KEYS: &[&str] = &[
    "nick",
    "name",
    "server",
    "tls",
    "channels",
    "sources",
    "poll_interval_secs",
    "align_interval_secs",
    "user_agent",
    "show_category",
    "base_url",
    "feed_suffix",
    "short_link_base",
    "send_delay_ms",
    "queue_capacity",
    "reconnect_cooldown_secs",
    "first_run_retry_secs",
    "liveness_interval_secs",
    "liveness_reconnect",
];

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load and validate configuration from a TOML file.
    ///
    /// - Missing file → `Err(ConfigError::Io)`; a relay without sources cannot run
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    /// - Semantic problems → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let meta = std::fs::metadata(path)?;
        if meta.len() > Self::MAX_FILE_SIZE {
            return Err(ConfigError::TooLarge(format!(
                "Config file is {} bytes (max {} bytes)",
                meta.len(),
                Self::MAX_FILE_SIZE
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            sources = config.sources.len(),
            channels = config.channels.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let mut config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values a relay depends on and normalize `base_url`.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::Invalid("no sources configured".into()));
        }
        if let Some(bad) = self.sources.iter().find(|s| !s.starts_with('/')) {
            return Err(ConfigError::Invalid(format!(
                "source '{bad}' must start with '/'"
            )));
        }
        if self.channels.is_empty() {
            return Err(ConfigError::Invalid("no channels configured".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be greater than 0".into(),
            ));
        }
        if self.first_run_retry_secs == 0 {
            return Err(ConfigError::Invalid(
                "first_run_retry_secs must be greater than 0".into(),
            ));
        }
        if self.reconnect_cooldown_secs == 0 {
            return Err(ConfigError::Invalid(
                "reconnect_cooldown_secs must be greater than 0".into(),
            ));
        }
        if self.nick.trim().is_empty() {
            return Err(ConfigError::Invalid("nick must not be empty".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue_capacity must be greater than 0".into(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("user_agent must not be empty".into()));
        }
        self.base_url = validate_base_url(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url: {e}")))?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn align_interval(&self) -> Option<Duration> {
        (self.align_interval_secs > 0).then(|| Duration::from_secs(self.align_interval_secs))
    }

    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }

    pub fn reconnect_cooldown(&self) -> Duration {
        Duration::from_secs(self.reconnect_cooldown_secs)
    }

    pub fn first_run_retry(&self) -> Duration {
        Duration::from_secs(self.first_run_retry_secs)
    }

    pub fn liveness_interval(&self) -> Option<Duration> {
        (self.liveness_interval_secs > 0).then(|| Duration::from_secs(self.liveness_interval_secs))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r##"
channels = ["#news"]
sources = ["/r/rust/new"]
"##;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.first_run_retry_secs, 600);
        assert_eq!(config.base_url, "https://www.reddit.com");
        assert!(!config.show_category);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(config.channels, vec!["#news"]);
        assert_eq!(config.sources, vec!["/r/rust/new"]);
        assert_eq!(config.send_delay(), Duration::from_secs(1));
        assert_eq!(config.align_interval(), None);
        assert_eq!(config.liveness_interval(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_full_config() {
        let content = r##"
nick = "relaybot"
name = "Relay Bot"
server = "irc.example.net:6667"
tls = false
channels = ["#a", "#b"]
sources = ["/r/rust/new", "/r/programming/new"]
poll_interval_secs = 120
align_interval_secs = 300
user_agent = "linux:relaybot:v1 (by /u/someone)"
show_category = true
base_url = "https://old.reddit.com/"
send_delay_ms = 500
queue_capacity = 10
reconnect_cooldown_secs = 30
first_run_retry_secs = 60
liveness_interval_secs = 0
liveness_reconnect = true
"##;
        let config = Config::from_toml(content).unwrap();
        assert_eq!(config.nick, "relaybot");
        assert!(!config.tls);
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.poll_interval(), Duration::from_secs(120));
        assert_eq!(config.align_interval(), Some(Duration::from_secs(300)));
        assert!(config.show_category);
        assert_eq!(config.base_url, "https://old.reddit.com");
        assert_eq!(config.send_delay(), Duration::from_millis(500));
        assert_eq!(config.reconnect_cooldown(), Duration::from_secs(30));
        assert_eq!(config.liveness_interval(), None);
        assert!(config.liveness_reconnect);
    }

    #[test]
    fn test_missing_sources_rejected() {
        let err = Config::from_toml("channels = [\"#a\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("no sources"));
    }

    #[test]
    fn test_missing_channels_rejected() {
        let err = Config::from_toml("sources = [\"/r/rust\"]\n").unwrap_err();
        assert!(err.to_string().contains("no channels"));
    }

    #[test]
    fn test_relative_source_rejected() {
        let content = "channels = [\"#a\"]\nsources = [\"r/rust\"]\n";
        let err = Config::from_toml(content).unwrap_err();
        assert!(err.to_string().contains("must start with '/'"));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let content = format!("{MINIMAL}poll_interval_secs = 0\n");
        assert!(matches!(
            Config::from_toml(&content),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_zero_retry_and_cooldown_rejected() {
        for key in ["first_run_retry_secs", "reconnect_cooldown_secs"] {
            let content = format!("{MINIMAL}{key} = 0\n");
            let err = Config::from_toml(&content).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)));
            assert!(err.to_string().contains(key), "{err}");
        }
    }

    #[test]
    fn test_empty_nick_rejected() {
        let content = format!("{MINIMAL}nick = \"  \"\n");
        let err = Config::from_toml(&content).unwrap_err();
        assert!(err.to_string().contains("nick"));
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let content = format!("{MINIMAL}base_url = \"gopher://example.com\"\n");
        let err = Config::from_toml(&content).unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::from_toml("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let content = format!("{MINIMAL}poll_interval_secs = \"soon\"\n");
        assert!(matches!(
            Config::from_toml(&content),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let content = format!("{MINIMAL}totally_fake_key = 42\n");
        assert!(Config::from_toml(&content).is_ok());
    }

    #[test]
    fn test_missing_file_is_error() {
        let path = Path::new("/tmp/feedrelay_test_nonexistent_config.toml");
        assert!(matches!(Config::load(path), Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join("feedrelay_config_test_load");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("feedrelay.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.sources, vec!["/r/rust/new"]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("feedrelay_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("feedrelay.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
