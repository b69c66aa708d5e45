//! Line-oriented JSON connection to an SL4A server.
//!
//! Each [`RpcConnection`] is one TCP stream. Opening it performs the session
//! handshake; afterwards every request is a single JSON line answered by a
//! single JSON line.
//!
//! # Handshake
//!
//! | Held uid | Sent | Server reply |
//! |----------|------|--------------|
//! | `-1` | `{"cmd":"initiate","uid":-1}` | `{"status":true,"uid":N}` |
//! | `N` | `{"cmd":"continue","uid":N}` | `{"status":true,"uid":N}` |

// ============================================================================
// Imports
// ============================================================================

use std::io::{self, BufRead, BufReader, ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{from_str, to_string};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::{SessionUid, Ticket};
use crate::protocol::{Handshake, HandshakeResponse};
use crate::transport::pool::PoolConnection;

// ============================================================================
// Constants
// ============================================================================

/// Message used when the server stays silent during the handshake.
const NO_HANDSHAKE_RESPONSE: &str = "No response from handshake.";

// ============================================================================
// Helpers
// ============================================================================

/// Returns `true` if `err` is a socket read/write timeout.
///
/// Unix reports an expired `SO_RCVTIMEO` as `WouldBlock`, Windows as
/// `TimedOut`.
#[inline]
#[must_use]
pub(crate) fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

// ============================================================================
// Io
// ============================================================================

/// Buffered halves of the stream.
struct Io {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

// ============================================================================
// RpcConnection
// ============================================================================

/// A single handshaken connection to the SL4A server.
///
/// # Thread Safety
///
/// Reads and writes are serialized by an internal lock. [`close`] does not
/// take that lock, so another thread can unblock a pending read by closing
/// the connection.
///
/// [`close`]: PoolConnection::close
pub struct RpcConnection {
    /// Remote endpoint.
    addr: SocketAddr,
    /// Session uid after the handshake.
    uid: SessionUid,
    /// Stream halves used for request/response.
    io: Mutex<Io>,
    /// Handle used for timeouts and shutdown.
    socket: TcpStream,
    /// Next ticket to hand out.
    tickets: AtomicU64,
    /// Read timeout restored by [`reset_timeout`](Self::reset_timeout).
    default_timeout: Duration,
    /// Set once the socket has been shut down.
    closed: AtomicBool,
}

impl RpcConnection {
    /// Connects to `addr` and performs the session handshake.
    ///
    /// Sends `initiate` when `uid` is unknown, `continue` otherwise. The
    /// resulting uid is available through [`uid`](Self::uid).
    ///
    /// # Arguments
    ///
    /// * `addr` - Forwarded SL4A server address
    /// * `uid` - Session uid to continue, or [`SessionUid::UNKNOWN`]
    /// * `timeout` - Connect and read timeout
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the TCP connection cannot be established
    /// - [`Error::Handshake`] if the server does not answer the handshake
    /// - [`Error::Json`] if the handshake reply is not valid JSON
    pub fn open(addr: SocketAddr, uid: SessionUid, timeout: Duration) -> Result<Self> {
        let socket = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|e| Error::connection(format!("Failed to connect to {addr}: {e}")))?;
        socket.set_nodelay(true)?;
        socket.set_read_timeout(Some(timeout))?;

        let io = Io {
            reader: BufReader::new(socket.try_clone()?),
            writer: socket.try_clone()?,
        };

        let mut connection = Self {
            addr,
            uid,
            io: Mutex::new(io),
            socket,
            tickets: AtomicU64::new(0),
            default_timeout: timeout,
            closed: AtomicBool::new(false),
        };

        connection.handshake()?;
        Ok(connection)
    }

    /// Performs the initiate/continue exchange.
    fn handshake(&mut self) -> Result<()> {
        let request = to_string(&Handshake::for_uid(self.uid))?;

        let reply = match self.call(&request) {
            Ok(reply) => reply,
            Err(Error::Io(e)) if is_timeout(&e) => {
                return Err(Error::handshake(NO_HANDSHAKE_RESPONSE));
            }
            Err(e) => return Err(e),
        };

        if reply.trim().is_empty() {
            return Err(Error::handshake(NO_HANDSHAKE_RESPONSE));
        }

        let response: HandshakeResponse = from_str(&reply)?;
        let previous = self.uid;
        self.uid = response.assigned_uid();

        debug!(
            addr = %self.addr,
            previous = %previous,
            uid = %self.uid,
            status = response.status,
            "Handshake completed"
        );

        Ok(())
    }
}

// ============================================================================
// RpcConnection - Public API
// ============================================================================

impl RpcConnection {
    /// Returns the session uid held by this connection.
    #[inline]
    #[must_use]
    pub fn uid(&self) -> SessionUid {
        self.uid
    }

    /// Returns the remote address.
    #[inline]
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns `true` once the connection has been closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Hands out the next request ticket, starting at 0.
    #[inline]
    pub fn next_ticket(&self) -> Ticket {
        Ticket::new(self.tickets.fetch_add(1, Ordering::Relaxed))
    }

    /// Sets the read timeout for subsequent calls.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the socket option cannot be set.
    pub fn set_timeout(&self, timeout: Duration) -> Result<()> {
        self.socket.set_read_timeout(Some(timeout))?;
        Ok(())
    }

    /// Restores the read timeout given at [`open`](Self::open).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the socket option cannot be set.
    pub fn reset_timeout(&self) -> Result<()> {
        self.set_timeout(self.default_timeout)
    }

    /// Writes one line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the write fails.
    pub fn send_line(&self, line: &str) -> Result<()> {
        let mut io = self.io.lock();
        Self::write_line(&mut io.writer, line)
    }

    /// Reads one line, without the trailing newline.
    ///
    /// Returns an empty string if the server closed the stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on read failure or timeout.
    pub fn read_line(&self) -> Result<String> {
        let mut io = self.io.lock();
        Self::read_one(&mut io.reader)
    }

    /// Writes `line` and reads the reply under one lock.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is closed before or
    ///   during the call
    /// - [`Error::Io`] on write/read failure or timeout
    pub fn call(&self, line: &str) -> Result<String> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let mut io = self.io.lock();
        let reply =
            Self::write_line(&mut io.writer, line).and_then(|()| Self::read_one(&mut io.reader));

        // A local close unblocks the read with EOF or an error.
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        reply
    }

    fn write_line(writer: &mut TcpStream, line: &str) -> Result<()> {
        trace!(len = line.len(), "-> {line}");
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    fn read_one(reader: &mut BufReader<TcpStream>) -> Result<String> {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        trace!(len = line.len(), "<- {line}");
        Ok(line)
    }
}

impl PoolConnection for RpcConnection {
    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // NotConnected just means the peer got there first.
        if let Err(e) = self.socket.shutdown(Shutdown::Both)
            && e.kind() != ErrorKind::NotConnected
        {
            debug!(addr = %self.addr, error = %e, "Socket shutdown failed");
        }

        debug!(addr = %self.addr, uid = %self.uid, "Connection closed");
    }
}

impl Drop for RpcConnection {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Tests
// ============================================================================
