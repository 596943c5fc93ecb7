//! # JSON Server
//!
//! A server binds at construction, accepts one client connection at a time and
//! runs a receive → handle → reply loop until the client closes its side.
//!
//! ## State machine
//!
//! ```text
//! bind() ──► LISTENING ──► { ACCEPTING ⇄ PROCESSING } ──► SHUT_DOWN
//! ```
//!
//! `SHUT_DOWN` is reached when a receive observes the peer closing the
//! connection (or, for a [`ThreadedServer`](super::ThreadedServer), when it is
//! stopped). Nothing that happens inside a single cycle (a timeout, a bad
//! frame, a failing handler) ends the loop.

use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::common::config::SocketConfig;
use crate::common::connection::Transport;
use crate::common::error::{Result, SocketError};
use crate::common::messages::Message;

use super::handler::MessageHandler;

/// Pause after an accept failure other than a timeout (e.g. out of file descriptors).
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Single-connection JSON server driven by a [`MessageHandler`].
pub struct JsonServer<H> {
    transport: Transport,
    handler: H,
}

impl<H: MessageHandler> JsonServer<H> {
    /// Configure a transport, bind it and start listening.
    ///
    /// # Arguments
    /// - `config`: Address, port, timeout and framing to serve on
    /// - `handler`: Hook invoked for every received message
    ///
    /// # Errors
    /// `SocketError::Bind` if the address is already in use (including by
    /// another `JsonServer` in the same process).
    ///
    /// # Example
    /// ```ignore
    /// let mut server = JsonServer::bind(SocketConfig::new("127.0.0.1", 5491), EchoHandler).await?;
    /// server.serve_loop().await;
    /// ```
    pub async fn bind(config: SocketConfig, handler: H) -> Result<Self> {
        let mut transport = Transport::configure(config).await?;
        transport.bind()?;
        Ok(Self { transport, handler })
    }

    /// Wait for a client, replacing any connection currently held.
    pub async fn accept_connection(&mut self) -> Result<SocketAddr> {
        let peer = self.transport.accept().await?;
        info!("🤝 Accepted connection from {}:{}", peer.ip(), peer.port());
        Ok(peer)
    }

    /// Serve until the client closes the connection.
    ///
    /// Blocks the calling task for the server's whole lifetime. Errors in a
    /// cycle are logged and never returned.
    pub async fn serve_loop(&mut self) {
        self.serve_until(&CancellationToken::new()).await;
    }

    /// Serve until the client closes the connection or `cancel` fires.
    ///
    /// `cancel` is checked at the top of every iteration and also interrupts
    /// an in-flight accept or read. A cancelled server closes its sockets.
    pub async fn serve_until(&mut self, cancel: &CancellationToken) {
        while !self.transport.is_shut_down() {
            if cancel.is_cancelled() {
                break;
            }

            let keep_going = tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                keep_going = self.serve_once() => keep_going,
            };
            if !keep_going {
                break;
            }
        }

        if cancel.is_cancelled() {
            info!("Server on {} cancelled", self.transport.config().endpoint());
        }
        self.transport.close().await;
        debug!("Server loop on {} finished", self.transport.config().endpoint());
    }

    /// One loop iteration: accept if no client is connected, then exchange a
    /// single message. Returns `false` once the server can make no further
    /// progress.
    async fn serve_once(&mut self) -> bool {
        if !self.transport.is_connected() {
            match self.accept_connection().await {
                Ok(_) => {}
                Err(SocketError::NotListening) => {
                    warn!("Listening socket is closed, stopping server loop");
                    return false;
                }
                Err(e) if e.is_timeout() => {
                    debug!("Server loop accept timed out: {}", e);
                    tokio::task::yield_now().await;
                    return true;
                }
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    return true;
                }
            }
        }

        match self.exchange().await {
            Ok(()) => {}
            Err(e) if e.is_timeout() => {
                debug!("No message from client yet: {}", e);
                tokio::task::yield_now().await;
            }
            Err(e) => warn!("❌ Message processing failed: {}", e),
        }
        true
    }

    /// Receive one message, run the handler and send its reply, if any.
    async fn exchange(&mut self) -> Result<()> {
        let Some(message) = self.transport.receive().await? else {
            return Ok(());
        };

        let reply = self
            .handler
            .process_message(message)
            .map_err(SocketError::Handler)?;

        match reply {
            Some(reply) => self.send_obj(&reply).await,
            None => {
                debug!("Handler returned no reply");
                Ok(())
            }
        }
    }

    /// Send a message to the connected client.
    pub async fn send_obj(&mut self, message: &Message) -> Result<()> {
        self.transport.send(message).await
    }

    /// Read a message from the connected client; `Ok(None)` if it hung up.
    pub async fn read_obj(&mut self) -> Result<Option<Message>> {
        self.transport.receive().await
    }

    /// Close the client connection and the listening socket.
    pub async fn close(&mut self) {
        self.transport.close().await;
    }

    /// Address the server is listening on; `None` once shut down.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn is_shut_down(&self) -> bool {
        self.transport.is_shut_down()
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}
