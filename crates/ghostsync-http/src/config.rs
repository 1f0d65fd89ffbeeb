//! Server configuration.

use crate::error::ServerError;
use ghostsync_core::SessionConfig;
use std::net::IpAddr;
use std::time::Duration;

/// Port GhostText clients query by default.
pub const DEFAULT_PORT: u16 = 4001;

pub const DEFAULT_HOST: &str = "127.0.0.1";

/// How long a session channel waits for its connection before closing.
pub const DEFAULT_CHANNEL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface for the discovery endpoint and every session channel.
    pub host: String,
    /// Discovery port; `0` lets the OS choose.
    pub port: u16,
    pub channel_idle_timeout: Duration,
    pub session: SessionConfig,
}

impl ServerConfig {
    pub fn ip(&self) -> Result<IpAddr, ServerError> {
        self.host
            .parse()
            .map_err(|e| ServerError::InvalidAddress(format!("{}: {}", self.host, e)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            channel_idle_timeout: DEFAULT_CHANNEL_IDLE_TIMEOUT,
            session: SessionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_localhost_4001() {
        let config = ServerConfig::default();
        assert_eq!(config.ip().unwrap(), "127.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(config.port, 4001);
        assert_eq!(config.channel_idle_timeout, Duration::from_secs(60));
    }

    #[test]
    fn accepts_ipv6_hosts() {
        let config = ServerConfig {
            host: "::1".to_string(),
            port: 9000,
            ..ServerConfig::default()
        };
        assert_eq!(config.ip().unwrap(), "::1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn rejects_hostnames() {
        let config = ServerConfig {
            host: "localhost".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(config.ip(), Err(ServerError::InvalidAddress(_))));
    }
}
