//! # TCP Transport
//!
//! [`Transport`] owns the socket state shared by server and client: an
//! unbound socket created at configuration time, the listening socket once
//! bound, at most one active [`Connection`], and the shutdown flag.
//!
//! ## Lifecycle
//!
//! ```text
//! configure ─┬─ bind ── accept ─┐
//!            └─ connect ────────┴─ send / receive ... ── close
//! ```
//!
//! A zero-length read from the peer is the orderly end of a session:
//! [`Transport::receive`] closes the connection *and* the listener, sets the
//! shutdown flag and returns `Ok(None)`.

use std::io;
use std::net::SocketAddr;

use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};

use super::config::{SocketConfig, SocketTimeout};
use super::error::{Result, SocketError};
use super::framing::FrameCodec;
use super::messages::{self, Message};

/// Bytes requested per read while accumulating a frame.
pub const READ_CHUNK_SIZE: usize = 1024;

/// Pending inbound connections queued by the OS before `accept`.
pub const LISTEN_BACKLOG: u32 = 1;

/// A live TCP association with one peer.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Connection {
    fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

/// Socket state and framed message I/O shared by server and client.
#[derive(Debug)]
pub struct Transport {
    config: SocketConfig,
    /// Resolved form of `config.address:config.port`
    addr: SocketAddr,
    timeout: SocketTimeout,
    codec: FrameCodec,
    /// Unbound, unconnected socket; consumed by `bind` or `connect`
    socket: Option<TcpSocket>,
    listener: Option<TcpListener>,
    conn: Option<Connection>,
    shutdown: bool,
}

impl Transport {
    /// Store `config`, resolve its address and create an unbound socket.
    ///
    /// # Errors
    /// - `InvalidTimeout` if `timeout_secs` is negative or not finite
    /// - `InvalidAddress` if the address does not resolve
    /// - `Io` if the socket cannot be created
    pub async fn configure(config: SocketConfig) -> Result<Self> {
        let timeout = config.timeout()?;

        let addr = lookup_host((config.address.as_str(), config.port))
            .await
            .map_err(|_| SocketError::InvalidAddress(config.address.clone()))?
            .next()
            .ok_or_else(|| SocketError::InvalidAddress(config.address.clone()))?;

        let socket = new_socket(addr)?;
        let codec = FrameCodec::new(config.framing, config.max_frame_bytes);

        debug!(
            "Configured transport for {} ({} framing, timeout {:?})",
            addr,
            config.framing,
            timeout
        );

        Ok(Self {
            config,
            addr,
            timeout,
            codec,
            socket: Some(socket),
            listener: None,
            conn: None,
            shutdown: false,
        })
    }

    /// Enable address reuse, bind the configured address and listen with a
    /// backlog of [`LISTEN_BACKLOG`].
    pub fn bind(&mut self) -> Result<SocketAddr> {
        let socket = self.take_socket()?;
        let bind_err = |source: io::Error| SocketError::Bind {
            addr: self.addr.to_string(),
            source,
        };

        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(self.addr).map_err(bind_err)?;
        let listener = socket.listen(LISTEN_BACKLOG).map_err(bind_err)?;
        let local = listener.local_addr()?;

        self.listener = Some(listener);
        self.shutdown = false;
        info!("🎧 Listening on {}", local);
        Ok(local)
    }

    /// Wait for one inbound peer, replacing any previous connection.
    ///
    /// # Errors
    /// - `NotListening` if `bind` has not succeeded or the listener was closed
    /// - `AcceptTimeout` if no peer arrived within the configured timeout
    pub async fn accept(&mut self) -> Result<SocketAddr> {
        let listener = self.listener.as_ref().ok_or(SocketError::NotListening)?;

        let (stream, peer) = self
            .timeout
            .apply(listener.accept())
            .await
            .map_err(SocketError::AcceptTimeout)??;

        if let Some(previous) = self.conn.replace(Connection::new(stream, peer)) {
            debug!("Dropping previous connection to {}", previous.peer);
        }
        debug!("Connection accepted from {}", peer);
        Ok(peer)
    }

    /// Connect to the configured address.
    ///
    /// A fresh socket is created for each attempt, so a failed connect can be
    /// retried.
    pub async fn connect(&mut self) -> Result<SocketAddr> {
        let socket = self.take_socket()?;
        let addr = self.addr;

        let stream = match self.timeout.apply(socket.connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(SocketError::Connect {
                    addr: addr.to_string(),
                    source,
                })
            }
            Err(limit) => {
                return Err(SocketError::Connect {
                    addr: addr.to_string(),
                    source: io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connect timed out after {:?}", limit),
                    ),
                })
            }
        };

        self.conn = Some(Connection::new(stream, addr));
        self.shutdown = false;
        Ok(addr)
    }

    /// Frame `message` and write it to the active connection.
    ///
    /// Partial writes are continued until every byte has been accepted.
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        let frame = self.codec.encode(message)?;
        let timeout = self.timeout;
        let conn = self.conn.as_mut().ok_or(SocketError::NotConnected)?;

        let mut sent = 0;
        while sent < frame.len() {
            let written = timeout
                .apply(conn.stream.write(&frame[sent..]))
                .await
                .map_err(SocketError::Timeout)??;
            if written == 0 {
                return Err(io::Error::from(io::ErrorKind::WriteZero).into());
            }
            sent += written;
        }
        timeout
            .apply(conn.stream.flush())
            .await
            .map_err(SocketError::Timeout)??;

        debug!("Sent {} byte frame to {}", frame.len(), conn.peer);
        Ok(())
    }

    /// Read one framed message from the active connection.
    ///
    /// # Returns
    /// - `Ok(Some(message))`: a complete frame was received and decoded
    /// - `Ok(None)`: the peer closed its side; the transport is now shut down
    /// - `Err(Decode)`: the frame was complete but held invalid JSON
    /// - `Err(FrameTooLarge)`: the connection has been dropped; a server keeps
    ///   listening and may accept again
    pub async fn receive(&mut self) -> Result<Option<Message>> {
        let timeout = self.timeout;
        let codec = self.codec;
        let mut buf: Vec<u8> = Vec::new();
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            let conn = self.conn.as_mut().ok_or(SocketError::NotConnected)?;
            let read = timeout
                .apply(conn.stream.read(&mut chunk))
                .await
                .map_err(SocketError::Timeout)??;

            if read == 0 {
                info!("🔌 Peer {} closed the connection", conn.peer);
                if !buf.is_empty() {
                    warn!("Discarding {} bytes of an incomplete frame", buf.len());
                }
                self.close().await;
                self.shutdown = true;
                return Ok(None);
            }

            buf.extend_from_slice(&chunk[..read]);

            match codec.payload(&buf) {
                Ok(Some(payload)) => {
                    debug!("Received {} byte frame from {}", buf.len(), conn.peer);
                    return messages::from_bytes(payload).map(Some);
                }
                Ok(None) => {}
                Err(e) => {
                    // The rest of the frame is still unread; the stream cannot resync.
                    warn!("Dropping connection to {}: {}", conn.peer, e);
                    self.drop_connection().await;
                    return Err(e);
                }
            }
        }
    }

    /// Shut down and release the connection and the listening socket.
    ///
    /// Errors are ignored; calling this more than once is harmless.
    pub async fn close(&mut self) {
        self.drop_connection().await;
        if self.listener.take().is_some() {
            debug!("Listening socket on {} closed", self.addr);
        }
        self.socket = None;
    }

    /// Shut down and release only the peer connection; the listener survives.
    async fn drop_connection(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            if let Err(e) = conn.stream.shutdown().await {
                debug!("Ignoring shutdown error for {}: {}", conn.peer, e);
            }
            debug!("Connection to {} closed", conn.peer);
        }
    }

    fn take_socket(&mut self) -> Result<TcpSocket> {
        match self.socket.take() {
            Some(socket) => Ok(socket),
            None => Ok(new_socket(self.addr)?),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    /// Set once the peer has closed its side of the connection.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.conn.as_ref().map(Connection::peer_addr)
    }

    /// Bound address of the listener, if listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn timeout(&self) -> SocketTimeout {
        self.timeout
    }

    /// Change the timeout applied to subsequent socket operations.
    pub fn set_timeout(&mut self, timeout: SocketTimeout) {
        self.timeout = timeout;
    }

    pub fn address(&self) -> &str {
        &self.config.address
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }
}

fn new_socket(addr: SocketAddr) -> io::Result<TcpSocket> {
    if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
}
