//! Bounded pool of connections to a single SL4A server.
//!
//! Callers borrow a connection for the duration of one RPC and hand it back
//! afterwards. The pool grows lazily up to `max_connections`; once every
//! connection is checked out, [`ConnectionPool::acquire`] polls until one is
//! released.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              ConnectionPool                  │
//! │  free:    [conn-3] [conn-5]                  │
//! │  working: {conn-1, conn-2, conn-4}           │
//! │  creating: 1   (opened outside the lock)     │
//! │                                              │
//! │  free + working + creating <= max            │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! `free` and `working` are disjoint and together hold every live connection
//! the pool created. All mutation happens under one mutex, which is never
//! held while sleeping or while a new connection is being opened.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::ops::Deref;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHashMap;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;

// ============================================================================
// Constants
// ============================================================================

/// Interval between attempts while every connection is checked out.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// PoolConnection
// ============================================================================

/// A connection that can be managed by a [`ConnectionPool`].
pub trait PoolConnection: Send + Sync {
    /// Closes the underlying stream.
    ///
    /// May be called from any thread, including while another thread holds
    /// the connection.
    fn close(&self);
}

/// Factory used to open new connections.
pub type Connector<C> = Box<dyn Fn() -> Result<C> + Send + Sync>;

// ============================================================================
// Pooled
// ============================================================================

/// A connection checked out of a pool.
///
/// Hand it back with [`ConnectionPool::release`] or drop it from the pool
/// with [`ConnectionPool::discard`].
pub struct Pooled<C> {
    id: ConnectionId,
    conn: Arc<C>,
}

impl<C> Pooled<C> {
    /// Returns the pool-assigned id of this connection.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl<C> Deref for Pooled<C> {
    type Target = C;

    #[inline]
    fn deref(&self) -> &C {
        &self.conn
    }
}

impl<C> fmt::Debug for Pooled<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled").field("id", &self.id).finish()
    }
}

// ============================================================================
// Rejected
// ============================================================================

/// A connection the pool refused to take back.
///
/// The lease is handed back untouched so it can still be returned to the
/// pool it came from.
pub struct Rejected<C> {
    error: Error,
    conn: Pooled<C>,
}

impl<C> Rejected<C> {
    /// Returns why the connection was refused.
    #[inline]
    #[must_use]
    pub fn error(&self) -> &Error {
        &self.error
    }

    /// Returns the refused connection.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Pooled<C> {
        self.conn
    }

    /// Splits into the error and the refused connection.
    #[inline]
    #[must_use]
    pub fn into_parts(self) -> (Error, Pooled<C>) {
        (self.error, self.conn)
    }
}

impl<C> fmt::Debug for Rejected<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .field("conn", &self.conn)
            .finish()
    }
}

impl<C> fmt::Display for Rejected<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<C> std::error::Error for Rejected<C> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<C> From<Rejected<C>> for Error {
    fn from(rejected: Rejected<C>) -> Self {
        rejected.error
    }
}

// ============================================================================
// PoolState
// ============================================================================

/// Partition of the pool's connections.
struct PoolState<C> {
    /// Idle connections, oldest first.
    free: VecDeque<(ConnectionId, Arc<C>)>,
    /// Checked-out connections.
    working: FxHashMap<ConnectionId, Arc<C>>,
    /// Slots reserved for connections currently being opened.
    creating: usize,
    /// Set once by `terminate`.
    terminated: bool,
}

impl<C> PoolState<C> {
    fn new() -> Self {
        Self {
            free: VecDeque::new(),
            working: FxHashMap::default(),
            creating: 0,
            terminated: false,
        }
    }

    #[inline]
    fn occupied(&self) -> usize {
        self.free.len() + self.working.len() + self.creating
    }
}

/// Slot held while a connection is opened outside the lock.
///
/// Dropping it unsettled gives the slot back, so a panicking connector
/// cannot shrink the pool.
struct Reservation<'a, C> {
    state: &'a Mutex<PoolState<C>>,
}

impl<'a, C> Reservation<'a, C> {
    /// Re-takes the lock and gives the slot back to the caller.
    fn settle(self) -> MutexGuard<'a, PoolState<C>> {
        let lock: &'a Mutex<PoolState<C>> = self.state;
        mem::forget(self);

        let mut state = lock.lock();
        state.creating -= 1;
        state
    }
}

impl<C> Drop for Reservation<'_, C> {
    fn drop(&mut self) {
        self.state.lock().creating -= 1;
    }
}

// ============================================================================
// ConnectionPool
// ============================================================================

/// Fixed-capacity pool of connections to one server endpoint.
///
/// Thread-safe; share it behind an [`Arc`] or a reference.
///
/// # Example
///
/// ```ignore
/// let pool = ConnectionPool::new(4, DEFAULT_POLL_INTERVAL, Box::new(move || {
///     RpcConnection::open(addr, uid, timeout)
/// }))?;
///
/// let conn = pool.acquire()?;
/// // ... use conn ...
/// pool.release(conn)?;
/// ```
pub struct ConnectionPool<C: PoolConnection> {
    /// Free/working partition.
    state: Mutex<PoolState<C>>,
    /// Opens new connections.
    connector: Connector<C>,
    /// Upper bound on live connections.
    max_connections: usize,
    /// Sleep between acquire attempts.
    poll_interval: Duration,
}

// ============================================================================
// ConnectionPool - Constructor
// ============================================================================

impl<C: PoolConnection> ConnectionPool<C> {
    /// Creates an empty pool.
    ///
    /// No connection is opened until the first [`acquire`](Self::acquire).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `max_connections` is zero.
    pub fn new(
        max_connections: usize,
        poll_interval: Duration,
        connector: Connector<C>,
    ) -> Result<Self> {
        if max_connections == 0 {
            return Err(Error::config("max_connections must be at least 1"));
        }

        Ok(Self {
            state: Mutex::new(PoolState::new()),
            connector,
            max_connections,
            poll_interval,
        })
    }
}

// ============================================================================
// ConnectionPool - Public API
// ============================================================================

impl<C: PoolConnection> ConnectionPool<C> {
    /// Checks out a connection, blocking until one is available.
    ///
    /// Reuses a free connection if there is one, otherwise opens a new one
    /// while below capacity. When the pool is exhausted the calling thread
    /// sleeps for the poll interval and tries again, with no upper bound on
    /// the wait.
    ///
    /// # Errors
    ///
    /// - Any error returned by the connector while opening a connection
    /// - [`Error::PoolTerminated`] if the pool is terminated, including while
    ///   this call is waiting
    pub fn acquire(&self) -> Result<Pooled<C>> {
        loop {
            if let Some(conn) = self.try_acquire()? {
                return Ok(conn);
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// Checks out a connection without waiting.
    ///
    /// Returns `Ok(None)` if every slot is taken.
    ///
    /// # Errors
    ///
    /// Same as [`acquire`](Self::acquire).
    pub fn try_acquire(&self) -> Result<Option<Pooled<C>>> {
        {
            let mut state = self.state.lock();
            if state.terminated {
                return Err(Error::PoolTerminated);
            }

            if let Some((id, conn)) = state.free.pop_front() {
                state.working.insert(id, Arc::clone(&conn));
                trace!(id = %id, "Reusing free connection");
                return Ok(Some(Pooled { id, conn }));
            }

            if state.occupied() >= self.max_connections {
                return Ok(None);
            }

            state.creating += 1;
        }

        let reservation = Reservation { state: &self.state };
        let opened = (self.connector)();
        let mut state = reservation.settle();

        let conn = match opened {
            Ok(conn) => Arc::new(conn),
            Err(e) => {
                warn!(error = %e, "Failed to open pooled connection");
                return Err(e);
            }
        };

        if state.terminated {
            drop(state);
            conn.close();
            return Err(Error::PoolTerminated);
        }

        let id = ConnectionId::next();
        state.working.insert(id, Arc::clone(&conn));
        debug!(
            id = %id,
            total = state.free.len() + state.working.len(),
            max = self.max_connections,
            "Opened pooled connection"
        );

        Ok(Some(Pooled { id, conn }))
    }

    /// Adds an already open connection to the free set.
    ///
    /// Used to seed the pool with the connection that performed the
    /// session handshake.
    ///
    /// # Errors
    ///
    /// - [`Error::PoolTerminated`] if the pool is terminated
    /// - [`Error::Config`] if the pool is already at capacity
    ///
    /// The connection is closed on error.
    pub fn adopt(&self, conn: C) -> Result<ConnectionId> {
        let mut state = self.state.lock();

        let rejection = if state.terminated {
            Some(Error::PoolTerminated)
        } else if state.occupied() >= self.max_connections {
            Some(Error::config(format!(
                "pool already holds {} connections",
                self.max_connections
            )))
        } else {
            None
        };

        if let Some(e) = rejection {
            drop(state);
            conn.close();
            return Err(e);
        }

        let id = ConnectionId::next();
        state.free.push_back((id, Arc::new(conn)));
        debug!(id = %id, "Adopted connection");
        Ok(id)
    }

    /// Returns a checked-out connection to the free set.
    ///
    /// # Errors
    ///
    /// Hands `conn` back inside [`Rejected`] with:
    ///
    /// - [`Error::NotCheckedOut`] if `conn` is not checked out of this pool;
    ///   neither pool changes and `conn` can still go back to its own pool
    /// - [`Error::PoolTerminated`] if the pool was terminated meanwhile
    pub fn release(&self, conn: Pooled<C>) -> std::result::Result<(), Rejected<C>> {
        let mut state = self.state.lock();
        if let Some(error) = Self::check_out_status(&state, conn.id) {
            return Err(Rejected { error, conn });
        }

        if let Some(shared) = state.working.remove(&conn.id) {
            state.free.push_back((conn.id, shared));
        }
        trace!(id = %conn.id, "Released connection");
        Ok(())
    }

    /// Removes a checked-out connection from the pool and closes it.
    ///
    /// Used when the stream can no longer be trusted, for example after a
    /// read timeout left a response in flight. Frees one slot.
    ///
    /// # Errors
    ///
    /// Same as [`release`](Self::release); a refused connection is not
    /// closed.
    pub fn discard(&self, conn: Pooled<C>) -> std::result::Result<(), Rejected<C>> {
        {
            let mut state = self.state.lock();
            if let Some(error) = Self::check_out_status(&state, conn.id) {
                return Err(Rejected { error, conn });
            }
            state.working.remove(&conn.id);
        }

        conn.close();
        debug!(id = %conn.id, "Discarded connection");
        Ok(())
    }

    /// Closes every connection, free or checked out, and shuts the pool.
    ///
    /// Each connection is closed exactly once. Further calls are no-ops.
    pub fn terminate(&self) {
        let connections: Vec<Arc<C>> = {
            let mut state = self.state.lock();
            if state.terminated {
                return;
            }
            state.terminated = true;

            let free = state.free.drain(..).map(|(_, conn)| conn);
            let mut all: Vec<_> = free.collect();
            all.extend(state.working.drain().map(|(_, conn)| conn));
            all
        };

        let count = connections.len();
        for conn in connections {
            conn.close();
        }

        info!(closed = count, "Connection pool terminated");
    }

    /// Returns why `id` cannot be checked in, if it cannot.
    fn check_out_status(state: &PoolState<C>, id: ConnectionId) -> Option<Error> {
        if state.terminated {
            Some(Error::PoolTerminated)
        } else if !state.working.contains_key(&id) {
            Some(Error::not_checked_out(id))
        } else {
            None
        }
    }
}

// ============================================================================
// ConnectionPool - Introspection
// ============================================================================

impl<C: PoolConnection> ConnectionPool<C> {
    /// Returns the configured capacity.
    #[inline]
    #[must_use]
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Returns the number of idle connections.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.state.lock().free.len()
    }

    /// Returns the number of checked-out connections.
    #[inline]
    #[must_use]
    pub fn working_count(&self) -> usize {
        self.state.lock().working.len()
    }

    /// Returns the number of live connections.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.free.len() + state.working.len()
    }

    /// Returns `true` if the pool holds no connections.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once [`terminate`](Self::terminate) has run.
    #[inline]
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.state.lock().terminated
    }
}

impl<C: PoolConnection> Drop for ConnectionPool<C> {
    fn drop(&mut self) {
        self.terminate();
    }
}

// ============================================================================
// Tests
// ============================================================================
