//! Client configuration.
//!
//! [`ClientConfig`] can be built in code or read from the JSON testbed
//! configuration used by the test harness.
//!
//! # Example
//!
//! ```ignore
//! use sl4a_rpc::ClientConfig;
//!
//! let config = ClientConfig::from_json_str(r#"{"address": "127.0.0.1:9999", "max_connections": 4}"#)?;
//! assert_eq!(config.max_connections, 4);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default forwarded port of the SL4A server.
pub const DEFAULT_PORT: u16 = 8080;

/// Default number of pooled connections per session.
pub const DEFAULT_MAX_CONNECTIONS: usize = 15;

/// Default socket timeout (60s).
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Default sleep between attempts on an exhausted pool.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Default number of attempts when the server sends an empty response.
pub const DEFAULT_RETRIES: u32 = 3;

// ============================================================================
// ClientConfig
// ============================================================================

/// Settings for one SL4A session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Host-side address of the forwarded SL4A port.
    pub address: SocketAddr,

    /// Maximum number of concurrent connections.
    pub max_connections: usize,

    /// Connect and read timeout in milliseconds.
    pub timeout_ms: u64,

    /// Sleep between attempts while the pool is exhausted, in milliseconds.
    pub poll_interval_ms: u64,

    /// Attempts per RPC when the server answers with an empty line.
    pub retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            retries: DEFAULT_RETRIES,
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ClientConfig {
    /// Creates a default configuration for `address`.
    #[inline]
    #[must_use]
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            ..Default::default()
        }
    }

    /// Parses and validates a JSON configuration object.
    ///
    /// Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the text is not a valid configuration object
    /// - [`Error::Config`] if a value is out of range
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl ClientConfig {
    /// Returns the socket timeout.
    #[inline]
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns the pool poll interval.
    #[inline]
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::config("max_connections must be at least 1"));
        }
        if self.retries == 0 {
            return Err(Error::config("retries must be at least 1"));
        }
        if self.timeout_ms == 0 {
            return Err(Error::config("timeout_ms must be greater than zero"));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::config("poll_interval_ms must be greater than zero"));
        }
        if self.address.port() == 0 {
            return Err(Error::config("address must include a port"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.address.port(), DEFAULT_PORT);
        assert_eq!(config.max_connections, 15);
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
        assert_eq!(config.retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config =
            ClientConfig::from_json_str(r#"{"address": "127.0.0.1:9999", "max_connections": 4}"#)
                .expect("parse");
        assert_eq!(config.address.port(), 9999);
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.retries, DEFAULT_RETRIES);
    }

    #[test]
    fn test_from_json_empty_object() {
        let config = ClientConfig::from_json_str("{}").expect("parse");
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_from_json_rejects_zero_connections() {
        let result = ClientConfig::from_json_str(r#"{"max_connections": 0}"#);
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_from_json_rejects_bad_address() {
        let result = ClientConfig::from_json_str(r#"{"address": "not an address"}"#);
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_validate_zero_retries() {
        let config = ClientConfig {
            retries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_poll_interval() {
        let config = ClientConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn test_validate_zero_port() {
        let config = ClientConfig::new(SocketAddr::from(([127, 0, 0, 1], 0)));
        assert!(config.validate().is_err());
    }
}
