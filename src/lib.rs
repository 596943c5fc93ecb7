//! # json-socket
//!
//! JSON message passing between one client and one server over a single TCP
//! connection, for lightweight control channels: send a command object, get a
//! reply object.
//!
//! - [`common`]: configuration, framing and the TCP transport
//! - [`server`]: [`JsonServer`], [`ThreadedServer`] and the [`MessageHandler`] hook
//! - [`client`]: [`JsonClient`]

pub mod client;
pub mod common;
pub mod server;

pub use client::JsonClient;
pub use common::{Framing, Message, SocketConfig, SocketError, SocketTimeout};
pub use server::{EchoHandler, JsonServer, MessageHandler, ThreadedServer};
