//! # Server Components
//!
//! - [`handler`]: The [`MessageHandler`] hook and the stock [`EchoHandler`]
//! - [`server`]: [`JsonServer`], whose serve loop runs on the caller's task
//! - [`threaded`]: [`ThreadedServer`], the same loop on a background task

pub mod handler;
pub mod server;
pub mod threaded;

pub use handler::{EchoHandler, MessageHandler};
pub use server::JsonServer;
pub use threaded::ThreadedServer;
