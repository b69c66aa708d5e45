//! RPC client over pooled SL4A connections.
//!
//! The [`RpcClient`] borrows a connection from its pool for each call, so
//! several threads can talk to the same session concurrently, up to the
//! pool's capacity.
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use sl4a_rpc::RpcClient;
//!
//! # fn example() -> sl4a_rpc::Result<()> {
//! let client = RpcClient::builder().port(9999).connect()?;
//!
//! let build: String = client.call("getBuildID", vec![])?;
//! client.rpc("wifiToggleState", vec![json!(true)])?;
//!
//! client.terminate();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Value, from_str, from_value, to_string};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::{SessionUid, Ticket};
use crate::protocol::{Request, Response};
use crate::transport::connection::is_timeout;
use crate::transport::{ConnectionPool, Pooled, RpcConnection};

use super::builder::RpcClientBuilder;
use super::config::ClientConfig;

// ============================================================================
// Types
// ============================================================================

/// Callback invoked when the device stops answering.
///
/// Runs on the thread that observed the failure, before the error is
/// returned to the caller.
pub type ErrorCallback = Arc<dyn Fn(&Error) + Send + Sync>;

// ============================================================================
// RpcClient
// ============================================================================

/// Client for one SL4A session.
///
/// # Thread Safety
///
/// `RpcClient` is `Send + Sync`; share it with an [`Arc`] and call
/// [`rpc`](Self::rpc) from any thread.
pub struct RpcClient {
    /// Settings the client was created with.
    config: ClientConfig,
    /// Session uid assigned by the server.
    uid: SessionUid,
    /// Pooled connections, all bound to `uid`.
    pool: ConnectionPool<RpcConnection>,
    /// Cleared by `terminate`.
    alive: AtomicBool,
    /// Disconnect callback.
    on_error: Option<ErrorCallback>,
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient")
            .field("address", &self.config.address)
            .field("uid", &self.uid)
            .field("connections", &self.pool.len())
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RpcClient - Constructor
// ============================================================================

impl RpcClient {
    /// Creates a configuration builder for the client.
    #[inline]
    #[must_use]
    pub fn builder() -> RpcClientBuilder {
        RpcClientBuilder::new()
    }

    /// Opens a new session with the server at `config.address`.
    ///
    /// The first connection initiates the session; every later pool
    /// connection continues it with the assigned uid.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `config` is invalid
    /// - [`Error::Connection`] if the server cannot be reached
    /// - [`Error::Handshake`] if the server does not assign a session uid
    pub fn connect(config: ClientConfig, on_error: Option<ErrorCallback>) -> Result<Self> {
        config.validate()?;

        let first = RpcConnection::open(config.address, SessionUid::UNKNOWN, config.timeout())?;
        let uid = first.uid();
        if !uid.is_known() {
            return Err(Error::handshake("server did not assign a session uid"));
        }

        let address = config.address;
        let timeout = config.timeout();
        let pool = ConnectionPool::new(
            config.max_connections,
            config.poll_interval(),
            Box::new(move || RpcConnection::open(address, uid, timeout)),
        )?;
        pool.adopt(first)?;

        info!(
            address = %address,
            uid = %uid,
            max_connections = config.max_connections,
            "SL4A session opened"
        );

        Ok(Self {
            config,
            uid,
            pool,
            alive: AtomicBool::new(true),
            on_error,
        })
    }
}

// ============================================================================
// RpcClient - Public API
// ============================================================================

impl RpcClient {
    /// Returns the session uid.
    #[inline]
    #[must_use]
    pub fn uid(&self) -> SessionUid {
        self.uid
    }

    /// Returns the configuration the client was created with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns `false` once [`terminate`](Self::terminate) has been called.
    #[inline]
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Returns the number of open connections.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.pool.len()
    }

    /// Calls `method` with positional `params` and returns the raw result.
    ///
    /// # Errors
    ///
    /// - [`Error::Api`] if the facade reported an error
    /// - [`Error::NoResponse`] if every attempt got an empty response
    /// - [`Error::RequestTimeout`] if no response arrived in time
    /// - [`Error::Connection`] if the device disconnected
    /// - [`Error::MismatchedId`] if the response carries another ticket
    /// - [`Error::PoolTerminated`] after [`terminate`](Self::terminate)
    pub fn rpc(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        self.execute(method, params, None)
    }

    /// Same as [`rpc`](Self::rpc) with a one-off read timeout.
    ///
    /// # Errors
    ///
    /// Same as [`rpc`](Self::rpc).
    pub fn rpc_with_timeout(
        &self,
        method: &str,
        params: Vec<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        self.execute(method, params, Some(timeout))
    }

    /// Calls `method` and deserializes the result into `T`.
    ///
    /// # Errors
    ///
    /// Same as [`rpc`](Self::rpc), plus [`Error::Json`] if the result does
    /// not match `T`.
    pub fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
        let value = self.rpc(method, params)?;
        Ok(from_value(value)?)
    }

    /// Closes every connection of the session.
    ///
    /// Calls still in flight fail with a connection error, logged as
    /// cleanup rather than a device disconnect.
    pub fn terminate(&self) {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        self.pool.terminate();
        info!(uid = %self.uid, "RPC client terminated");
    }
}

// ============================================================================
// RpcClient - Call Execution
// ============================================================================

impl RpcClient {
    /// Runs one RPC on a pooled connection.
    fn execute(&self, method: &str, params: Vec<Value>, timeout: Option<Duration>) -> Result<Value> {
        let conn = self.pool.acquire()?;
        let ticket = conn.next_ticket();

        let exchanged = self.exchange(&conn, method, ticket, params, timeout);
        self.check_in(conn, &exchanged, timeout.is_some());

        let line = exchanged?;
        let response: Response = from_str(&line)?;

        match response.into_result(method, ticket) {
            Err(e @ Error::Api { .. }) => {
                warn!(error = %e, "RPC returned an error");
                Err(e)
            }
            Err(e @ Error::MismatchedId { .. }) => {
                error!(method, error = %e, "RPC response has mismatched id");
                Err(e)
            }
            other => other,
        }
    }

    /// Sends the request and reads the raw response line.
    fn exchange(
        &self,
        conn: &RpcConnection,
        method: &str,
        ticket: Ticket,
        params: Vec<Value>,
        timeout: Option<Duration>,
    ) -> Result<String> {
        if let Some(timeout) = timeout {
            conn.set_timeout(timeout)?;
        }

        let request = to_string(&Request::new(ticket, method, params))?;
        let retries = self.config.retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let line = match conn.call(&request) {
                Ok(line) => line,
                Err(Error::Io(e)) if is_timeout(&e) => {
                    let waited = timeout.unwrap_or_else(|| self.config.timeout());
                    let waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX);
                    let err = Error::request_timeout(method, waited_ms);
                    warn!(method, ticket = %ticket, "RPC timed out");
                    return Err(err);
                }
                Err(Error::Io(e)) => return Err(self.disconnected(method, &e)),
                Err(Error::ConnectionClosed) => {
                    return Err(self.disconnected(method, &Error::ConnectionClosed));
                }
                Err(e) => return Err(e),
            };

            if !line.trim().is_empty() {
                return Ok(line);
            }

            if attempt < retries {
                warn!(method, attempt, "No response for RPC method");
                continue;
            }

            error!(method, attempt, "No response for RPC method");
            let err = Error::no_response(method);
            self.notify(&err);
            return Err(err);
        }
    }

    /// Returns the connection to the pool, or drops it if it is unusable.
    fn check_in(&self, conn: Pooled<RpcConnection>, exchanged: &Result<String>, custom_timeout: bool) {
        let reusable = exchanged.is_ok() && (!custom_timeout || conn.reset_timeout().is_ok());

        let id = conn.id();
        let result = if reusable {
            self.pool.release(conn)
        } else {
            self.pool.discard(conn)
        };

        if let Err(e) = result {
            debug!(id = %id, error = %e, "Connection not returned to pool");
        }
    }

    /// Classifies a socket failure during a call.
    fn disconnected(&self, method: &str, e: &dyn fmt::Display) -> Error {
        let err = Error::connection(e.to_string());

        if self.is_alive() {
            error!(
                method,
                error = %e,
                "The device disconnected during RPC call. Check logcat for a crash or disconnect."
            );
            self.notify(&err);
        } else {
            warn!(method, error = %e, "The connection was killed during cleanup");
        }

        err
    }

    fn notify(&self, err: &Error) {
        if let Some(callback) = &self.on_error {
            callback(err);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
