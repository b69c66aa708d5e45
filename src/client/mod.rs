//! SL4A RPC client.
//!
//! This module provides the entry points for talking to an SL4A server.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RpcClient`] | Issues RPCs over pooled connections |
//! | [`RpcClientBuilder`] | Fluent configuration builder |
//! | [`ClientConfig`] | Serializable client settings |
//! | [`Session`] | One server-side session and its client |
//! | [`SessionManager`] | Registry of sessions on one device |
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use sl4a_rpc::{Result, RpcClient};
//!
//! # fn example() -> Result<()> {
//! let session = RpcClient::builder().port(9999).open_session()?;
//!
//! session.client().rpc("bluetoothToggleState", vec![json!(true)])?;
//! session.terminate();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for client configuration.
pub mod builder;

/// Client settings.
pub mod config;

/// Core client implementation.
pub mod core;

/// Session registry.
pub mod manager;

/// Session lifecycle.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::RpcClientBuilder;
pub use config::ClientConfig;
pub use self::core::{ErrorCallback, RpcClient};
pub use manager::SessionManager;
pub use session::Session;
