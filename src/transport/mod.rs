//! TCP transport layer.
//!
//! This module handles the sockets between the host (Rust) and the SL4A
//! server on the device, reached through an `adb forward`ed port.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                             ┌──────────────────┐
//! │  RpcClient       │                             │  SL4A server     │
//! │                  │     N x TCP (JSON lines)    │  (on device)     │
//! │  ConnectionPool  │◄───────────────────────────►│                  │
//! │  → RpcConnection │      127.0.0.1:PORT         │  session uid     │
//! └──────────────────┘                             └──────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `RpcConnection::open` - Connect and handshake (`initiate`/`continue`)
//! 2. `ConnectionPool::acquire` - Check a connection out for one RPC
//! 3. `ConnectionPool::release` - Return it to the free set
//! 4. `ConnectionPool::terminate` - Close every connection
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Handshaken line-oriented connection |
//! | `pool` | Bounded connection pool |

// ============================================================================
// Submodules
// ============================================================================

/// Handshaken line-oriented connection.
pub mod connection;

/// Bounded connection pool.
pub mod pool;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::RpcConnection;
pub use pool::{
    ConnectionPool, Connector, DEFAULT_POLL_INTERVAL, PoolConnection, Pooled, Rejected,
};
