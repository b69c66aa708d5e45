//! Tracks the SL4A sessions opened against one device.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::identifiers::SessionUid;

use super::config::ClientConfig;
use super::core::ErrorCallback;
use super::session::Session;

// ============================================================================
// SessionManager
// ============================================================================

/// Registry of open sessions keyed by uid.
///
/// Thread-safe; sessions are handed out as [`Arc<Session>`].
pub struct SessionManager {
    /// Settings new sessions start from.
    base: ClientConfig,
    /// Disconnect callback handed to every session.
    on_error: Option<ErrorCallback>,
    /// Open sessions.
    sessions: RwLock<FxHashMap<SessionUid, Arc<Session>>>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("base", &self.base)
            .field("sessions", &self.session_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SessionManager - Constructor
// ============================================================================

impl SessionManager {
    /// Creates an empty manager.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `base` is invalid.
    pub fn new(base: ClientConfig, on_error: Option<ErrorCallback>) -> Result<Self> {
        base.validate()?;
        Ok(Self {
            base,
            on_error,
            sessions: RwLock::new(FxHashMap::default()),
        })
    }
}

// ============================================================================
// SessionManager - Public API
// ============================================================================

impl SessionManager {
    /// Opens and registers a new session.
    ///
    /// # Arguments
    ///
    /// * `max_connections` - Pool size override for this session
    /// * `server_port` - Forwarded port override for this session
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if an override is invalid
    /// - [`Error::Protocol`] if the server handed out a uid already in use
    /// - Connection and handshake errors from [`Session::open`]
    pub fn create_session(
        &self,
        max_connections: Option<usize>,
        server_port: Option<u16>,
    ) -> Result<Arc<Session>> {
        let mut config = self.base.clone();
        if let Some(max_connections) = max_connections {
            config.max_connections = max_connections;
        }
        if let Some(port) = server_port {
            config.address.set_port(port);
        }

        let session = Arc::new(Session::open(config, self.on_error.clone())?);
        let uid = session.uid();

        {
            let mut sessions = self.sessions.write();
            if sessions.contains_key(&uid) {
                drop(sessions);
                session.client().terminate();
                return Err(Error::protocol(format!(
                    "SL4A returned an existing uid to a new session: {uid}"
                )));
            }
            sessions.insert(uid, Arc::clone(&session));
        }

        debug!(uid = %uid, "Session registered");
        Ok(session)
    }

    /// Returns the session with `uid`, if open.
    #[inline]
    #[must_use]
    pub fn session(&self, uid: SessionUid) -> Option<Arc<Session>> {
        self.sessions.read().get(&uid).cloned()
    }

    /// Returns the session with the lowest uid.
    #[must_use]
    pub fn primary(&self) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .iter()
            .min_by_key(|(uid, _)| **uid)
            .map(|(_, session)| Arc::clone(session))
    }

    /// Returns the uids of all open sessions in ascending order.
    #[must_use]
    pub fn uids(&self) -> Vec<SessionUid> {
        let mut uids: Vec<_> = self.sessions.read().keys().copied().collect();
        uids.sort_unstable();
        uids
    }

    /// Returns the number of open sessions.
    #[inline]
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Terminates and forgets the session with `uid`.
    ///
    /// Returns `false` if no such session was open.
    pub fn terminate_session(&self, uid: SessionUid) -> bool {
        let removed = self.sessions.write().remove(&uid);

        match removed {
            Some(session) => {
                session.terminate();
                true
            }
            None => false,
        }
    }

    /// Terminates every open session.
    pub fn terminate_all(&self) {
        let sessions: Vec<_> = {
            let mut map = self.sessions.write();
            map.drain().map(|(_, session)| session).collect()
        };

        let count = sessions.len();
        for session in sessions {
            session.terminate();
        }

        info!(count, "All sessions terminated");
    }
}

// ============================================================================
// Tests
// ============================================================================
