//! SL4A session lifecycle.
//!
//! A [`Session`] wraps the [`RpcClient`] of one server-side session and
//! knows how to end it cleanly: the server is asked to drop the session
//! before the local connections are closed.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::SessionUid;

use super::config::ClientConfig;
use super::core::{ErrorCallback, RpcClient};

// ============================================================================
// Constants
// ============================================================================

/// RPC asking the server to forget the session.
const CLOSE_SESSION_RPC: &str = "closeSl4aSession";

/// RPC blocking on the device until a named event is posted.
const EVENT_WAIT_RPC: &str = "eventWaitFor";

/// Extra socket time on top of the device-side event wait.
const EVENT_WAIT_MARGIN: Duration = Duration::from_secs(5);

// ============================================================================
// Session
// ============================================================================

/// One SL4A session and its client.
pub struct Session {
    /// Client bound to this session's uid.
    client: RpcClient,
    /// Set once `terminate` has run.
    terminated: AtomicBool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("uid", &self.uid())
            .field("terminated", &self.is_terminated())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Wraps an already connected client.
    #[inline]
    #[must_use]
    pub fn new(client: RpcClient) -> Self {
        Self {
            client,
            terminated: AtomicBool::new(false),
        }
    }

    /// Opens a new session.
    ///
    /// # Errors
    ///
    /// Same as [`RpcClient::connect`].
    pub fn open(config: ClientConfig, on_error: Option<ErrorCallback>) -> Result<Self> {
        RpcClient::connect(config, on_error).map(Self::new)
    }

    /// Returns the session uid.
    #[inline]
    #[must_use]
    pub fn uid(&self) -> SessionUid {
        self.client.uid()
    }

    /// Returns the session's RPC client.
    #[inline]
    #[must_use]
    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    /// Returns `true` once the session has been terminated.
    #[inline]
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Blocks until the device posts an event called `name`.
    ///
    /// The event is removed from the device-side queue.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if no such event arrived within `timeout`
    /// - Any error from [`RpcClient::rpc`]
    pub fn wait_for_event(&self, name: &str, timeout: Duration) -> Result<Value> {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let event = self.client.rpc_with_timeout(
            EVENT_WAIT_RPC,
            vec![json!(name), json!(true), json!(timeout_ms)],
            timeout.saturating_add(EVENT_WAIT_MARGIN),
        )?;

        if event.is_null() {
            return Err(Error::timeout(format!("waiting for event {name}"), timeout_ms));
        }

        debug!(uid = %self.uid(), event = name, "Event received");
        Ok(event)
    }

    /// Ends the session on the server and closes every connection.
    ///
    /// Failing to reach the server is logged, not returned. Further calls
    /// are no-ops.
    pub fn terminate(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self.client.rpc(CLOSE_SESSION_RPC, Vec::new()) {
            warn!(uid = %self.uid(), error = %e, "Failed to close session on device");
        }

        self.client.terminate();
        info!(uid = %self.uid(), "Session terminated");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::transport::testing::{FakeServer, Handler, Reply};

    fn open(server: &FakeServer) -> Session {
        let config = ClientConfig {
            timeout_ms: 2_000,
            poll_interval_ms: 1,
            ..ClientConfig::new(server.addr())
        };
        Session::open(config, None).expect("open session")
    }

    #[test]
    fn test_open_assigns_uid() {
        let server = FakeServer::echo();
        let session = open(&server);
        assert!(session.uid().is_known());
        assert!(!session.is_terminated());
        assert_eq!(session.client().uid(), session.uid());
    }

    #[test]
    fn test_terminate_closes_session_once() {
        let server = FakeServer::echo();
        let session = open(&server);

        session.terminate();
        session.terminate();

        assert!(session.is_terminated());
        assert!(!session.client().is_alive());
        assert_eq!(server.calls_to(CLOSE_SESSION_RPC), 1);
    }

    #[test]
    fn test_terminate_tolerates_api_error() {
        let handler: Handler = Arc::new(|_: &str, _: &[Value]| Reply::Error(json!("gone")));
        let server = FakeServer::with_handler(handler);
        let session = open(&server);

        session.terminate();
        assert!(session.is_terminated());
    }

    #[test]
    fn test_wait_for_event_returns_event() {
        let handler: Handler = Arc::new(|method: &str, params: &[Value]| {
            assert_eq!(method, EVENT_WAIT_RPC);
            Reply::Result(json!({"name": params[0], "data": {"state": "ON"}}))
        });
        let server = FakeServer::with_handler(handler);
        let session = open(&server);

        let event = session
            .wait_for_event("BluetoothStateChanged", Duration::from_millis(500))
            .expect("event");
        assert_eq!(event["name"], "BluetoothStateChanged");
        assert_eq!(event["data"]["state"], "ON");
    }

    #[test]
    fn test_wait_for_event_null_is_timeout() {
        let handler: Handler = Arc::new(|_: &str, _: &[Value]| Reply::Result(Value::Null));
        let server = FakeServer::with_handler(handler);
        let session = open(&server);

        let result = session.wait_for_event("WifiScanResults", Duration::from_millis(50));
        assert!(matches!(result, Err(Error::Timeout { timeout_ms: 50, .. })));
    }

    #[test]
    fn test_wait_for_event_unbounded_timeout() {
        let handler: Handler = Arc::new(|_: &str, params: &[Value]| {
            Reply::Result(json!({"name": params[0], "wait_ms": params[2]}))
        });
        let server = FakeServer::with_handler(handler);
        let session = open(&server);

        let event = session
            .wait_for_event("BluetoothStateChanged", Duration::MAX)
            .expect("event");
        assert_eq!(event["wait_ms"], json!(u64::MAX));
    }
}
