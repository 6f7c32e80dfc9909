//! Node configuration, loaded from JSON.

use std::path::{Path, PathBuf};

use plexus_clock::ClockConfig;
use plexus_dispatch::DispatchConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// How the bridge stamps outgoing net message headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Written to the header's player id field when set.
    pub player_id: Option<u32>,
    /// Stamp the wall-clock send time.
    pub stamp_time_sent: bool,
    /// Carry the protocol version. Peers reject versioned messages from a
    /// different version; unversioned ones are accepted as is.
    pub send_version: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            player_id: None,
            stamp_time_sent: true,
            send_version: true,
        }
    }
}

/// Everything a [`crate::PlexusNode`] needs.
///
/// Missing fields take their defaults, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlexusConfig {
    pub bind_addr: String,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub dispatch: DispatchConfig,
    pub clock: ClockConfig,
    pub bridge: BridgeConfig,
}

impl Default for PlexusConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:14617".to_string(),
            log_filter: "info".to_string(),
            dispatch: DispatchConfig::default(),
            clock: ClockConfig::default(),
            bridge: BridgeConfig::default(),
        }
    }
}

impl PlexusConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loading config");
        Self::from_json_str(&json)
    }

    /// Validates every section.
    pub fn validated(mut self) -> Self {
        self.dispatch = self.dispatch.validated();
        self.clock = self.clock.validated();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        let config = PlexusConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PlexusConfig::default());
        assert!(config.bridge.send_version);
        assert_eq!(config.clock.tick_rate_hz, 0);
    }

    #[test]
    fn test_nested_sections_and_validation() {
        let config = PlexusConfig::from_json_str(
            r#"{
                "bind_addr": "0.0.0.0:9000",
                "dispatch": { "live_warn_len": 0 },
                "clock": { "tick_rate_hz": 400 },
                "bridge": { "player_id": 77, "stamp_time_sent": false }
            }"#,
        )
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.dispatch.live_warn_len, 1);
        assert_eq!(config.clock.tick_rate_hz, ClockConfig::MAX_TICK_RATE_HZ);
        assert_eq!(config.bridge.player_id, Some(77));
        assert!(!config.bridge.stamp_time_sent);
        assert!(config.bridge.send_version);
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        let err = PlexusConfig::from_json_str(r#"{"bind_addr": 5}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("plexus-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"log_filter": "plexus=trace"}"#).unwrap();
        let config = PlexusConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(config.log_filter, "plexus=trace");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = PlexusConfig::load("/nonexistent/plexus.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
