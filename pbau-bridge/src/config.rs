//! Configuration for the bridge.

use std::path::Path;

use serde::{Deserialize, Serialize};

use pbau_core::client::{ControlOptions, MIN_STATUS_INTERVAL};
use pbau_core::{ConnectionInfo, DEFAULT_PORT};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Where the automation server lives.
    pub network: NetworkConfig,
    /// What to poll.
    pub polling: PollingConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Server hostname or IP address.
    pub host: String,
    /// Server TCP port.
    pub port: u16,
    /// Domain number of the show; frames of other domains are ignored.
    pub domain: i32,
}

/// Polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Sequence IDs to watch.
    pub sequences: Vec<i32>,
    /// Also poll the time remaining until each sequence's next cue.
    pub track_next_cue: bool,
    /// Status-poll period in milliseconds.
    pub status_interval_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            domain: 0,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            sequences: Vec::new(),
            track_next_cue: true,
            status_interval_ms: 200,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl BridgeConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        std::fs::write(path, Self::default_toml()?)
    }

    pub fn default_toml() -> std::io::Result<String> {
        toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)
    }

    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo::new(
            self.network.host.clone(),
            self.network.port,
            self.network.domain,
        )
    }

    /// Control-connection tunables; the poll period is floored at
    /// [`MIN_STATUS_INTERVAL`].
    pub fn control_options(&self) -> ControlOptions {
        ControlOptions {
            track_next_cue: self.polling.track_next_cue,
            status_interval: std::time::Duration::from_millis(self.polling.status_interval_ms)
                .max(MIN_STATUS_INTERVAL),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = BridgeConfig::default_toml().unwrap();
        assert!(text.contains("host"));
        assert!(text.contains("track_next_cue"));
    }

    #[test]
    fn roundtrip_config() {
        let text = BridgeConfig::default_toml().unwrap();
        let parsed = BridgeConfig::parse(&text).unwrap();
        assert_eq!(parsed.network.port, 6211);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = BridgeConfig::parse(
            r#"
            [network]
            host = "10.0.0.5"

            [polling]
            sequences = [1, 4]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.network.host, "10.0.0.5");
        assert_eq!(cfg.network.port, 6211);
        assert_eq!(cfg.polling.sequences, vec![1, 4]);
        assert!(cfg.polling.track_next_cue);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let cfg = BridgeConfig::load(Path::new("/nonexistent/pbau-bridge.toml"));
        assert_eq!(cfg.network.domain, 0);
    }

    #[test]
    fn control_options_floor_interval() {
        let mut cfg = BridgeConfig::default();
        cfg.polling.status_interval_ms = 0;
        assert_eq!(
            cfg.control_options().status_interval,
            MIN_STATUS_INTERVAL
        );
    }
}
