//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`RpcClient`],
//! [`Session`] and [`SessionManager`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use sl4a_rpc::RpcClient;
//!
//! # fn example() -> sl4a_rpc::Result<()> {
//! let client = RpcClient::builder()
//!     .port(9999)
//!     .max_connections(4)
//!     .timeout(Duration::from_secs(30))
//!     .connect()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};

use super::config::ClientConfig;
use super::core::{ErrorCallback, RpcClient};
use super::manager::SessionManager;
use super::session::Session;

// ============================================================================
// RpcClientBuilder
// ============================================================================

/// Builder for configuring an [`RpcClient`].
///
/// Use [`RpcClient::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct RpcClientBuilder {
    /// Accumulated settings.
    config: ClientConfig,
    /// Disconnect callback.
    on_error: Option<ErrorCallback>,
}

impl fmt::Debug for RpcClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClientBuilder")
            .field("config", &self.config)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

// ============================================================================
// RpcClientBuilder Implementation
// ============================================================================

impl RpcClientBuilder {
    /// Creates a new builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all settings with `config`.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the host-side address of the forwarded SL4A port.
    #[inline]
    #[must_use]
    pub fn address(mut self, address: SocketAddr) -> Self {
        self.config.address = address;
        self
    }

    /// Sets only the port, keeping the host.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.address.set_port(port);
        self
    }

    /// Sets the maximum number of concurrent connections.
    #[inline]
    #[must_use]
    pub fn max_connections(mut self, max_connections: usize) -> Self {
        self.config.max_connections = max_connections;
        self
    }

    /// Sets the connect and read timeout.
    #[inline]
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the sleep between attempts on an exhausted pool.
    ///
    /// Millisecond resolution; anything shorter is rejected on connect.
    #[inline]
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the number of attempts when the server sends an empty line.
    #[inline]
    #[must_use]
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    /// Sets the callback run when the device stops answering.
    #[inline]
    #[must_use]
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Returns the settings accumulated so far.
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &ClientConfig {
        &self.config
    }

    /// Validates the settings and opens a client.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if a setting is invalid
    /// - Connection and handshake errors from [`RpcClient::connect`]
    pub fn connect(self) -> Result<RpcClient> {
        self.config.validate()?;
        RpcClient::connect(self.config, self.on_error)
    }

    /// Validates the settings and opens a session.
    ///
    /// # Errors
    ///
    /// Same as [`connect`](Self::connect).
    pub fn open_session(self) -> Result<Session> {
        self.connect().map(Session::new)
    }

    /// Validates the settings and creates a session manager using them as
    /// the base configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a setting is invalid.
    pub fn into_manager(self) -> Result<SessionManager> {
        SessionManager::new(self.config, self.on_error)
    }
}

// ============================================================================
// Tests
// ============================================================================
