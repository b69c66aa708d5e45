//! SL4A RPC - pooled JSON-RPC client for the Scripting Layer for Android.
//!
//! This library talks to the SL4A server running on an Android device under
//! test, through a port the caller has already forwarded with `adb`.
//!
//! # Architecture
//!
//! - **Session**: the server hands out a uid on the first handshake; every
//!   further connection of the session continues that uid
//! - **Connection pool**: a bounded set of TCP connections per session; each
//!   RPC checks one out, blocking while all are busy
//! - **Protocol**: newline-delimited JSON, `{"id", "method", "params"}`
//!   answered by `{"id", "result", "error"}`
//!
//! Everything is blocking and thread-based; share an [`RpcClient`] between
//! threads to issue calls concurrently.
//!
//! # Quick Start
//!
//! ```no_run
//! use serde_json::json;
//! use sl4a_rpc::{Result, RpcClient};
//!
//! fn main() -> Result<()> {
//!     let client = RpcClient::builder()
//!         .port(9999)
//!         .max_connections(4)
//!         .connect()?;
//!
//!     let model: String = client.call("getBuildModel", vec![])?;
//!     println!("Device model: {model}");
//!
//!     client.rpc("wifiToggleState", vec![json!(true)])?;
//!     client.terminate();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`RpcClient`], [`Session`], [`SessionManager`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types |
//! | [`transport`] | Connections and the connection pool |

// ============================================================================
// Modules
// ============================================================================

/// RPC client, sessions and configuration.
///
/// Use [`RpcClient::builder()`] to create a configured client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for connections, sessions and requests.
pub mod identifiers;

/// SL4A wire protocol message types.
pub mod protocol;

/// TCP transport layer.
///
/// Connection handling and the bounded connection pool.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{
    ClientConfig, ErrorCallback, RpcClient, RpcClientBuilder, Session, SessionManager,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionId, SessionUid, Ticket};

// Transport types
pub use transport::{ConnectionPool, PoolConnection, Pooled, Rejected, RpcConnection};
