//! # Client Components
//!
//! [`JsonClient`] connects to a server and performs ad hoc send/receive
//! exchanges over a single connection.

pub mod client;

pub use client::JsonClient;
