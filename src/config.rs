//! Configuration file parser for the aggregation run.
//!
//! The config file is optional in the sense that every key has a default;
//! a missing file yields `Config::default()`. Unknown keys are ignored by
//! serde, though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::feed::MAX_FEED_SIZE;
use crate::pipeline::AggregatorOptions;

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

    /// A value parsed but is out of range.
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feed URLs to aggregate, in submission order.
    pub feeds: Vec<String>,

    /// Maximum number of feeds fetched at the same time.
    pub concurrency: usize,

    /// Per-feed fetch timeout in seconds.
    pub timeout_secs: u64,

    /// Per-feed body size limit in bytes.
    pub max_feed_bytes: usize,

    /// Merge newest first. `false` passes items through in arrival order.
    pub sorted: bool,

    /// Metadata for the rendered output channel.
    pub channel: ChannelConfig,
}

/// Metadata written into the `<channel>` of the generated RSS document.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub title: String,
    pub description: String,
    /// Link to the site the aggregated feed represents.
    pub site_url: Option<String>,
    /// Public URL of the generated feed itself.
    pub feed_url: Option<String>,
    pub language: Option<String>,
    pub copyright: Option<String>,
    /// Suggested cache lifetime in minutes.
    pub ttl: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            concurrency: 2,
            timeout_secs: 30,
            max_feed_bytes: MAX_FEED_SIZE,
            sorted: true,
            channel: ChannelConfig::default(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            title: "feedagg".to_string(),
            description: String::new(),
            site_url: None,
            feed_url: None,
            language: None,
            copyright: None,
            ttl: None,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "feeds",
        "concurrency",
        "timeout_secs",
        "max_feed_bytes",
        "sorted",
        "channel",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - `concurrency = 0` → `Err(ConfigError::Invalid)`
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to avoid loading a huge file
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse as a raw table first to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        tracing::info!(
            feeds = config.feeds.len(),
            concurrency = config.concurrency,
            "Loaded configuration"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn aggregator_options(&self) -> AggregatorOptions {
        AggregatorOptions {
            concurrency: self.concurrency,
            timeout: Duration::from_secs(self.timeout_secs),
            max_feed_bytes: self.max_feed_bytes,
            sorted: self.sorted,
            ..AggregatorOptions::default()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.feeds.is_empty());
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_feed_bytes, MAX_FEED_SIZE);
        assert_eq!(config.channel.title, "feedagg");
        assert!(config.channel.site_url.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedagg_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.concurrency, 2);
    }

    #[test]
    fn test_whitespace_only_returns_default() {
        let config = Config::from_toml("   \n  \n  ").unwrap();
        assert_eq!(config.concurrency, 2);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let config = Config::from_toml("feeds = [\"https://example.com/rss\"]\n").unwrap();
        assert_eq!(config.feeds, vec!["https://example.com/rss"]);
        assert_eq!(config.concurrency, 2); // default
        assert_eq!(config.channel.title, "feedagg"); // default
    }

    #[test]
    fn test_full_config() {
        let dir = std::env::temp_dir().join("feedagg_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
feeds = [
    "https://news.ycombinator.com/rss",
    "https://blog.rust-lang.org/feed.xml",
]
concurrency = 4
timeout_secs = 10
max_feed_bytes = 2048

[channel]
title = "My planet"
description = "Everything in one place"
site_url = "https://planet.example.com"
feed_url = "https://planet.example.com/rss.xml"
language = "en"
ttl = 60
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.feeds.len(), 2);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.max_feed_bytes, 2048);
        assert_eq!(config.channel.title, "My planet");
        assert_eq!(config.channel.description, "Everything in one place");
        assert_eq!(
            config.channel.feed_url.as_deref(),
            Some("https://planet.example.com/rss.xml")
        );
        assert_eq!(config.channel.language.as_deref(), Some("en"));
        assert_eq!(config.channel.ttl, Some(60));
        assert!(config.channel.copyright.is_none());

        let options = config.aggregator_options();
        assert_eq!(options.concurrency, 4);
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert_eq!(options.max_feed_bytes, 2048);
        assert!(options.sorted);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_sorted_can_be_switched_off() {
        let config = Config::from_toml("sorted = false\n").unwrap();
        assert!(!config.sorted);
        assert!(!config.aggregator_options().sorted);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::from_toml("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let content = r#"
concurrency = 3
totally_fake_key = "should not fail"
"#;
        let config = Config::from_toml(content).unwrap();
        assert_eq!(config.concurrency, 3);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::from_toml("feeds = 42\n").is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = Config::from_toml("concurrency = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("feedagg_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
