//! # Error Types
//!
//! Every fallible socket operation in the crate returns [`SocketError`].
//!
//! Two conditions are deliberately *not* errors:
//! - a peer closing its side of the connection shows up as `Ok(None)` from a
//!   receive and flips the transport's shutdown flag
//! - a failed client connect is reported as `false` from
//!   [`JsonClient::connect`](crate::client::JsonClient::connect)

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by the transport, server and client.
#[derive(Debug, Error)]
pub enum SocketError {
    /// Binding or listening on the configured address failed (e.g. address in use).
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Outbound connect failed. Only surfaced by [`Transport::connect`](crate::common::Transport::connect);
    /// the client maps it to `false`.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// A send or receive was attempted without an active connection.
    #[error("no active connection")]
    NotConnected,

    /// An accept was attempted on a transport that is not listening.
    #[error("transport is not listening")]
    NotListening,

    /// No peer connected within the configured timeout.
    #[error("accept timed out after {0:?}")]
    AcceptTimeout(Duration),

    /// A read or write did not complete within the configured timeout.
    #[error("socket operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// The frame was complete but its payload is not valid JSON.
    #[error("failed to decode frame payload: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("frame of {size} bytes exceeds limit of {max} bytes")]
    FrameTooLarge { size: usize, max: usize },

    #[error("cannot resolve address '{0}'")]
    InvalidAddress(String),

    #[error("invalid timeout {0}: must be finite and non-negative")]
    InvalidTimeout(f64),

    /// The message handler returned an error for this cycle.
    #[error("message handler failed: {0}")]
    Handler(anyhow::Error),

    /// The background server task panicked or was aborted.
    #[error("server worker failed: {0}")]
    Worker(#[source] tokio::task::JoinError),

    #[error("server worker already started")]
    AlreadyStarted,
}

impl SocketError {
    /// Whether this error is a timeout of any kind.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SocketError::AcceptTimeout(_) | SocketError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, SocketError>;
