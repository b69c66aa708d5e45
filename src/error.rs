//! Error types for the SL4A RPC client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use sl4a_rpc::{Error, Result, RpcClient};
//!
//! fn example(client: &RpcClient) -> Result<()> {
//!     match client.rpc("wifiGetConnectionInfo", vec![]) {
//!         Err(Error::Api { message, .. }) => println!("device said: {message}"),
//!         other => println!("{other:?}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::Handshake`] |
//! | Protocol | [`Error::Protocol`], [`Error::MismatchedId`], [`Error::NoResponse`] |
//! | Remote | [`Error::Api`] |
//! | Timing | [`Error::RequestTimeout`], [`Error::Timeout`] |
//! | Pool | [`Error::PoolTerminated`], [`Error::NotCheckedOut`] |
//! | External | [`Error::Io`], [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use serde_json::Value;
use thiserror::Error;

use crate::identifiers::{ConnectionId, Ticket};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Connection to the SL4A server failed or broke mid-call.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The connection was closed locally while a call was using it.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The server did not answer the session handshake.
    #[error("Handshake failed: {message}")]
    Handshake {
        /// Description of the handshake failure.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or malformed message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Response id did not match the ticket of the request.
    #[error("Mismatched API id: expected {expected}, got {actual}")]
    MismatchedId {
        /// Ticket sent with the request.
        expected: Ticket,
        /// Id carried by the response.
        actual: Value,
    },

    /// The server sent nothing back for an RPC, even after retries.
    #[error("No response from server for {method}")]
    NoResponse {
        /// RPC method name.
        method: String,
    },

    // ========================================================================
    // Remote Errors
    // ========================================================================
    /// The facade on the device reported an error for the call.
    #[error("Error in RPC {rpc_name} {code}:{message}")]
    Api {
        /// RPC method name.
        rpc_name: String,
        /// Error message reported by the device.
        message: String,
        /// Error code (`-1` when the server did not supply one).
        code: i64,
        /// Extra error payload (JSON-RPC 2.0 `data`).
        data: Value,
    },

    // ========================================================================
    // Timing Errors
    // ========================================================================
    /// No response was read before the socket timeout expired.
    #[error("RPC {method} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// RPC method name.
        method: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Operation timeout.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Pool Errors
    // ========================================================================
    /// The connection pool was terminated.
    #[error("Connection pool terminated")]
    PoolTerminated,

    /// A connection was released that the pool does not have checked out.
    #[error("Connection {id} is not checked out of this pool")]
    NotCheckedOut {
        /// The offending connection.
        id: ConnectionId,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a handshake error.
    #[inline]
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a mismatched id error.
    #[inline]
    pub fn mismatched_id(expected: Ticket, actual: Value) -> Self {
        Self::MismatchedId { expected, actual }
    }

    /// Creates a no-response error.
    #[inline]
    pub fn no_response(method: impl Into<String>) -> Self {
        Self::NoResponse {
            method: method.into(),
        }
    }

    /// Creates an API error.
    #[inline]
    pub fn api(
        rpc_name: impl Into<String>,
        message: impl Into<String>,
        code: i64,
        data: Value,
    ) -> Self {
        Self::Api {
            rpc_name: rpc_name.into(),
            message: message.into(),
            code,
            data,
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(method: impl Into<String>, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            method: method.into(),
            timeout_ms,
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a not-checked-out error.
    #[inline]
    pub fn not_checked_out(id: ConnectionId) -> Self {
        Self::NotCheckedOut { id }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. } | Self::Timeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::Handshake { .. }
        )
    }

    /// Returns `true` if the device-side facade rejected the call.
    #[inline]
    #[must_use]
    pub fn is_api_error(&self) -> bool {
        matches!(self, Self::Api { .. })
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RequestTimeout { .. } | Self::Timeout { .. } | Self::NoResponse { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("failed to connect");
        assert_eq!(err.to_string(), "Connection failed: failed to connect");
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("max_connections must be at least 1");
        assert_eq!(
            err.to_string(),
            "Configuration error: max_connections must be at least 1"
        );
    }

    #[test]
    fn test_api_error_display() {
        let err = Error::api("bluetoothToggleState", "Adapter off", 7, Value::Null);
        assert_eq!(
            err.to_string(),
            "Error in RPC bluetoothToggleState 7:Adapter off"
        );
        assert!(err.is_api_error());
    }

    #[test]
    fn test_mismatched_id_display() {
        let err = Error::mismatched_id(Ticket::new(3), serde_json::json!(4));
        assert_eq!(err.to_string(), "Mismatched API id: expected 3, got 4");
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::request_timeout("eventWait", 5000);
        let other_err = Error::connection("test");

        assert!(timeout_err.is_timeout());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("test").is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(Error::handshake("no response").is_connection_error());
        assert!(!Error::PoolTerminated.is_connection_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::no_response("getBuildID").is_recoverable());
        assert!(Error::timeout("eventWaitFor", 1000).is_recoverable());
        assert!(!Error::config("test").is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::BrokenPipe, "pipe closed");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<Value>("{not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
