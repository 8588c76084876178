use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::ClockMode;
use crate::error::{DiscoveryError, Result};

pub const DEFAULT_BROADCAST_PORT: u16 = 35498;
pub const DEFAULT_ANNOUNCE_INTERVAL_SECS: f64 = 1.0;
pub const DEFAULT_EVICTION_THRESHOLD: u32 = 10;

/// Discovery and probe settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// UDP port every node announces on and listens to
    pub broadcast_port: u16,

    /// Seconds between announcements
    pub announce_interval_secs: f64,

    /// Sightings after discovery before a neighbor is dropped
    pub eviction_threshold: u32,

    /// Destination of announcements
    pub broadcast_addr: Ipv4Addr,

    /// Local address for the discovery socket and the probe listener
    pub bind_addr: Ipv4Addr,

    /// Upper bound on probe connect and on probe read, each
    pub probe_timeout_ms: u64,

    pub clock: ClockMode,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            broadcast_port: DEFAULT_BROADCAST_PORT,
            announce_interval_secs: DEFAULT_ANNOUNCE_INTERVAL_SECS,
            eviction_threshold: DEFAULT_EVICTION_THRESHOLD,
            broadcast_addr: Ipv4Addr::BROADCAST,
            bind_addr: Ipv4Addr::UNSPECIFIED,
            probe_timeout_ms: 2000,
            clock: ClockMode::default(),
        }
    }
}

impl DiscoveryConfig {
    /// Load configuration from a TOML file. Missing keys keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            DiscoveryError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: DiscoveryConfig = toml::from_str(&raw).map_err(|e| {
            DiscoveryError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.announce_interval_secs.is_finite() || self.announce_interval_secs <= 0.0 {
            return Err(DiscoveryError::Config(format!(
                "announce_interval_secs must be a positive number, got {}",
                self.announce_interval_secs
            )));
        }
        if self.eviction_threshold == 0 {
            return Err(DiscoveryError::Config(
                "eviction_threshold must be at least 1".into(),
            ));
        }
        if self.probe_timeout_ms == 0 {
            return Err(DiscoveryError::Config(
                "probe_timeout_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn announce_interval(&self) -> Duration {
        Duration::from_secs_f64(self.announce_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_wire_constants() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.broadcast_port, 35498);
        assert_eq!(config.announce_interval(), Duration::from_secs(1));
        assert_eq!(config.eviction_threshold, 10);
        assert_eq!(config.clock, ClockMode::Subsec);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "broadcast_port = 40000").unwrap();
        writeln!(file, "announce_interval_secs = 0.5").unwrap();
        writeln!(file, "clock = \"epoch\"").unwrap();

        let config = DiscoveryConfig::load(file.path()).unwrap();
        assert_eq!(config.broadcast_port, 40000);
        assert_eq!(config.announce_interval(), Duration::from_millis(500));
        assert_eq!(config.eviction_threshold, DEFAULT_EVICTION_THRESHOLD);
        assert_eq!(config.clock, ClockMode::Epoch);
    }

    #[test]
    fn unreadable_file_is_config_error() {
        let err = DiscoveryConfig::load("/nonexistent/lanpulse.toml").unwrap_err();
        assert!(matches!(err, DiscoveryError::Config(_)));
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = DiscoveryConfig::default();
        config.announce_interval_secs = 0.0;
        assert!(config.validate().is_err());

        config.announce_interval_secs = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = DiscoveryConfig::default();
        config.eviction_threshold = 0;
        assert!(config.validate().is_err());

        let mut config = DiscoveryConfig::default();
        config.probe_timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}
