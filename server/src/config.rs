//! Server configuration
//!
//! Defaults match the reference deployment: 30 Hz snapshots, a ping every
//! five seconds and a ten second liveness window swept every ten seconds.

use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_millis(33);
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_millis(5000);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(10_000);
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const DEFAULT_MAX_CLIENTS: usize = 256;
pub const DEFAULT_MAX_PROTOCOL_VIOLATIONS: u32 = 10;
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 4096;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("max_clients must be at least 1")]
    NoCapacity,

    #[error("outbound_queue_capacity must be at least 1")]
    NoQueueCapacity,

    #[error("path must start with '/', got {0:?}")]
    InvalidPath(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the listener binds to, `host:port`
    pub bind_addr: String,
    /// Request path the WebSocket endpoint is served on
    pub path: String,
    pub snapshot_interval: Duration,
    pub ping_interval: Duration,
    pub sweep_interval: Duration,
    /// Maximum time since the last proof of life before eviction
    pub liveness_timeout: Duration,
    pub max_clients: usize,
    /// Undecodable binary frames tolerated before a connection is closed
    pub max_protocol_violations: u32,
    /// Frames that may wait for a slow socket before it is disconnected
    pub outbound_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            path: shared::NETWORK_PATH.to_string(),
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            ping_interval: DEFAULT_PING_INTERVAL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            liveness_timeout: DEFAULT_LIVENESS_TIMEOUT,
            max_clients: DEFAULT_MAX_CLIENTS,
            max_protocol_violations: DEFAULT_MAX_PROTOCOL_VIOLATIONS,
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Default configuration listening on `bind_addr`
    pub fn with_addr(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            ..Self::default()
        }
    }

    /// Rejects settings the event loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("snapshot_interval", self.snapshot_interval),
            ("ping_interval", self.ping_interval),
            ("sweep_interval", self.sweep_interval),
            ("liveness_timeout", self.liveness_timeout),
        ];
        if let Some(&(name, _)) = intervals.iter().find(|(_, value)| value.is_zero()) {
            return Err(ConfigError::ZeroInterval(name));
        }

        if self.max_clients == 0 {
            return Err(ConfigError::NoCapacity);
        }

        if self.outbound_queue_capacity == 0 {
            return Err(ConfigError::NoQueueCapacity);
        }

        if !self.path.starts_with('/') {
            return Err(ConfigError::InvalidPath(self.path.clone()));
        }

        Ok(())
    }

    /// Worst-case time from connect until a silent connection is evicted
    pub fn eviction_deadline(&self) -> Duration {
        self.liveness_timeout + self.sweep_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.path, "/network");
        assert_eq!(config.snapshot_interval, Duration::from_millis(33));
        assert_eq!(config.ping_interval, Duration::from_secs(5));
        assert_eq!(config.sweep_interval, Duration::from_secs(10));
        assert_eq!(config.liveness_timeout, Duration::from_secs(10));
        assert_eq!(config.max_protocol_violations, 10);
        assert_eq!(config.outbound_queue_capacity, 4096);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_unusable_settings() {
        let zero_ping = ServerConfig {
            ping_interval: Duration::ZERO,
            ..ServerConfig::default()
        };
        assert_eq!(
            zero_ping.validate(),
            Err(ConfigError::ZeroInterval("ping_interval"))
        );

        let no_capacity = ServerConfig {
            max_clients: 0,
            ..ServerConfig::default()
        };
        assert_eq!(no_capacity.validate(), Err(ConfigError::NoCapacity));

        let no_queue = ServerConfig {
            outbound_queue_capacity: 0,
            ..ServerConfig::default()
        };
        assert_eq!(no_queue.validate(), Err(ConfigError::NoQueueCapacity));

        let relative_path = ServerConfig {
            path: "network".to_string(),
            ..ServerConfig::default()
        };
        assert_eq!(
            relative_path.validate(),
            Err(ConfigError::InvalidPath("network".to_string()))
        );
    }

    #[test]
    fn test_with_addr_keeps_defaults() {
        let config = ServerConfig::with_addr("0.0.0.0:9000");

        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.max_clients, DEFAULT_MAX_CLIENTS);
        assert_eq!(config.eviction_deadline(), Duration::from_secs(20));
    }
}
