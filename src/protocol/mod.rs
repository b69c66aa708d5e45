//! SL4A wire protocol message types.
//!
//! SL4A speaks newline-delimited JSON over a plain TCP stream. Every
//! connection starts with a session handshake, after which each line is a
//! JSON-RPC style request or response.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Handshake` | Local → Remote | Initiate or continue a session |
//! | `HandshakeResponse` | Remote → Local | Session uid assignment |
//! | `Request` | Local → Remote | RPC call |
//! | `Response` | Remote → Local | RPC result or error |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `handshake` | Session handshake messages |
//! | `request` | Request and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// Session handshake messages.
pub mod handshake;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use handshake::{Handshake, HandshakeCommand, HandshakeResponse};
pub use request::{Request, Response};
