//! Configuration for roomq-ap
//!
//! A single TOML bootstrap file, every field optional:
//!
//! ```toml
//! [server]
//! port = 5750
//!
//! [playback]
//! progress_interval_ms = 1000
//! grace_secs = 2
//! max_consecutive_failures = 10
//!
//! [resolver]
//! program = "yt-dlp"
//!
//! [transport]
//! simulated_track_secs = 180
//!
//! [event_log]
//! path = "/var/lib/roomq/events.jsonl"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Priority: command-line arguments, then environment (`ROOMQ_*`), then this
//! file, then built-in defaults.

use roomq_common::config::{default_data_dir, load_toml_or_default, resolve_config_path};
use roomq_common::human_time::DEFAULT_BAR_LENGTH;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "ROOMQ_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub event_log: EventLogConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Broadcast buffer for SSE subscribers
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Orchestrator and progress reporter tuning
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// Progress reporter tick
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// How long past a known duration the reporter keeps going
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,

    #[serde(default = "default_bar_length")]
    pub bar_length: usize,

    /// Upper bound on resolution failures skipped by one start attempt
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: usize,

    /// Entries shown in a queue listing
    #[serde(default = "default_listing_limit")]
    pub listing_limit: usize,
}

impl PlaybackConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: default_progress_interval_ms(),
            grace_secs: default_grace_secs(),
            bar_length: default_bar_length(),
            max_consecutive_failures: default_max_consecutive_failures(),
            listing_limit: default_listing_limit(),
        }
    }
}

/// yt-dlp subprocess settings
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_resolver_program")]
    pub program: String,

    /// Passed as `--cookies` when set
    #[serde(default)]
    pub cookies_file: Option<PathBuf>,

    #[serde(default = "default_resolver_timeout_secs")]
    pub timeout_secs: u64,

    /// yt-dlp search scheme used for free-text queries
    #[serde(default = "default_search_prefix")]
    pub search_prefix: String,
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            program: default_resolver_program(),
            cookies_file: None,
            timeout_secs: default_resolver_timeout_secs(),
            search_prefix: default_search_prefix(),
        }
    }
}

/// Simulated voice transport
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Playback length of every simulated track
    #[serde(default = "default_simulated_track_secs")]
    pub simulated_track_secs: u64,
}

impl TransportConfig {
    pub fn simulated_track_length(&self) -> Duration {
        Duration::from_secs(self.simulated_track_secs)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            simulated_track_secs: default_simulated_track_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventLogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Defaults to `events.jsonl` in the platform data directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl EventLogConfig {
    /// Effective log path, None when disabled
    pub fn resolved_path(&self) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        Some(
            self.path
                .clone()
                .unwrap_or_else(|| default_data_dir().join("events.jsonl")),
        )
    }
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Level for roomq crates (trace, debug, info, warn, error)
    #[serde(default)]
    pub level: Option<String>,
}

impl LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub fn filter(&self) -> String {
        let level = self.level.as_deref().unwrap_or("debug");
        format!("roomq_ap={level},roomq_common={level},tower_http={level}")
    }
}

fn default_port() -> u16 {
    5750
}

fn default_event_capacity() -> usize {
    256
}

fn default_progress_interval_ms() -> u64 {
    1000
}

fn default_grace_secs() -> u64 {
    2
}

fn default_bar_length() -> usize {
    DEFAULT_BAR_LENGTH
}

fn default_max_consecutive_failures() -> usize {
    10
}

fn default_listing_limit() -> usize {
    10
}

fn default_resolver_program() -> String {
    "yt-dlp".to_string()
}

fn default_resolver_timeout_secs() -> u64 {
    30
}

fn default_search_prefix() -> String {
    "ytsearch1:".to_string()
}

fn default_simulated_track_secs() -> u64 {
    180
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Discover and load the bootstrap file
    ///
    /// Returns the config and the path it came from, if any.
    pub fn load(cli_path: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = resolve_config_path(cli_path, CONFIG_ENV_VAR);
        let config: Config = load_toml_or_default(path.as_deref())
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok((config, path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = roomq_common::config::parse_toml(content)
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.playback.progress_interval_ms == 0 {
            return Err(Error::Config(
                "playback.progress_interval_ms must be positive".to_string(),
            ));
        }
        if self.playback.bar_length == 0 {
            return Err(Error::Config(
                "playback.bar_length must be positive".to_string(),
            ));
        }
        if self.transport.simulated_track_secs == 0 {
            return Err(Error::Config(
                "transport.simulated_track_secs must be positive".to_string(),
            ));
        }
        if self.server.event_capacity == 0 {
            return Err(Error::Config(
                "server.event_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.server.port, 5750);
        assert_eq!(config.playback.progress_interval(), Duration::from_secs(1));
        assert_eq!(config.playback.grace(), Duration::from_secs(2));
        assert_eq!(config.playback.bar_length, 20);
        assert_eq!(config.playback.max_consecutive_failures, 10);
        assert_eq!(config.resolver.program, "yt-dlp");
        assert!(config.event_log.enabled);
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml(
            r#"
            [playback]
            grace_secs = 5

            [logging]
            level = "info"

            [event_log]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.playback.grace_secs, 5);
        assert_eq!(config.playback.progress_interval_ms, 1000);
        assert_eq!(
            config.logging.filter(),
            "roomq_ap=info,roomq_common=info,tower_http=info"
        );
        assert!(config.event_log.resolved_path().is_none());
    }

    #[test]
    fn test_explicit_event_log_path() {
        let config = Config::from_toml("[event_log]\npath = \"/tmp/roomq.jsonl\"\n").unwrap();
        assert_eq!(
            config.event_log.resolved_path(),
            Some(PathBuf::from("/tmp/roomq.jsonl"))
        );
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = Config::from_toml("[playback]\nprogress_interval_ms = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_default_log_filter() {
        assert_eq!(
            LoggingConfig::default().filter(),
            "roomq_ap=debug,roomq_common=debug,tower_http=debug"
        );
    }
}
