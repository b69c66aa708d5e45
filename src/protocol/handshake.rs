//! Session handshake messages.
//!
//! The first line sent on every connection is a handshake. A connection for
//! a brand new session sends `initiate` with uid `-1`; further connections of
//! the same session send `continue` with the uid the server handed out.
//!
//! ```json
//! {"cmd": "initiate", "uid": -1}
//! {"status": true, "uid": 4}
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::SessionUid;

// ============================================================================
// HandshakeCommand
// ============================================================================

/// Handshake command discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandshakeCommand {
    /// Start a new session.
    Initiate,
    /// Attach to an existing session.
    Continue,
}

impl HandshakeCommand {
    /// Picks the command for a connection that currently holds `uid`.
    #[inline]
    #[must_use]
    pub const fn for_uid(uid: SessionUid) -> Self {
        if uid.is_known() {
            Self::Continue
        } else {
            Self::Initiate
        }
    }
}

// ============================================================================
// Handshake
// ============================================================================

/// Handshake request line.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Handshake {
    /// Command to send.
    pub cmd: HandshakeCommand,
    /// Uid currently held by the connection.
    pub uid: SessionUid,
}

impl Handshake {
    /// Builds the handshake a connection holding `uid` should send.
    #[inline]
    #[must_use]
    pub const fn for_uid(uid: SessionUid) -> Self {
        Self {
            cmd: HandshakeCommand::for_uid(uid),
            uid,
        }
    }
}

// ============================================================================
// HandshakeResponse
// ============================================================================

/// Handshake reply from the server.
#[derive(Debug, Clone, Deserialize)]
pub struct HandshakeResponse {
    /// Whether the server accepted the handshake.
    #[serde(default)]
    pub status: bool,

    /// Uid assigned to the session.
    #[serde(default)]
    pub uid: Option<SessionUid>,
}

impl HandshakeResponse {
    /// Returns the uid the connection holds after this reply.
    ///
    /// A rejected handshake drops the connection back to
    /// [`SessionUid::UNKNOWN`].
    #[inline]
    #[must_use]
    pub fn assigned_uid(&self) -> SessionUid {
        if self.status {
            self.uid.unwrap_or(SessionUid::UNKNOWN)
        } else {
            SessionUid::UNKNOWN
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
