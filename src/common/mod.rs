//! # Common Components
//!
//! Shared utilities and data structures used by both client and server components.
//!
//! ## Modules
//!
//! - [`messages`]: The JSON message type and its byte encoding
//! - [`framing`]: Marker-delimited and length-prefixed frame codec
//! - [`connection`]: TCP transport with timeouts and connection lifecycle
//! - [`config`]: Endpoint configuration and TOML loading
//! - [`error`]: The crate's error type

pub mod config;
pub mod connection;
pub mod error;
pub mod framing;
pub mod messages;

pub use config::{Framing, SocketConfig, SocketTimeout};
pub use connection::Transport;
pub use error::{Result, SocketError};
pub use messages::Message;
