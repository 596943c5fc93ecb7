//! # JSON Client
//!
//! Connects to a [`JsonServer`](crate::server::JsonServer) and exchanges
//! messages with it, one request and one reply at a time.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut client = JsonClient::configure(SocketConfig::new("127.0.0.1", 5491)).await?;
//! if client.connect().await {
//!     client.send_obj(&json!({"message": "new connection"})).await?;
//!     let reply = client.read_obj().await?;
//!     client.close().await;
//! }
//! ```

use log::{debug, error, info};

use crate::common::config::SocketConfig;
use crate::common::connection::Transport;
use crate::common::error::Result;
use crate::common::messages::Message;

/// Client side of a JSON socket connection.
#[derive(Debug)]
pub struct JsonClient {
    transport: Transport,
}

impl JsonClient {
    /// Prepare a client for `config`. Does not connect.
    pub async fn configure(config: SocketConfig) -> Result<Self> {
        let transport = Transport::configure(config).await?;
        Ok(Self { transport })
    }

    /// Connect to the configured server.
    ///
    /// # Returns
    /// `true` on success. Failures are logged and reported as `false`, never
    /// as an error.
    pub async fn connect(&mut self) -> bool {
        debug!("Connecting to {}", self.transport.config().endpoint());
        match self.transport.connect().await {
            Ok(addr) => {
                info!("✅ Socket connected to {}", addr);
                true
            }
            Err(e) => {
                error!("❌ Socket connection error: {}", e);
                false
            }
        }
    }

    pub async fn send_obj(&mut self, message: &Message) -> Result<()> {
        self.transport.send(message).await
    }

    /// Read the next message; `Ok(None)` if the server closed the connection.
    pub async fn read_obj(&mut self) -> Result<Option<Message>> {
        self.transport.receive().await
    }

    pub async fn close(&mut self) {
        self.transport.close().await;
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::SocketError;
    use serde_json::json;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_failure_returns_false() {
        // Reserve a port, then free it so nothing is listening there.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut client = JsonClient::configure(SocketConfig::new("127.0.0.1", port).with_timeout_secs(2.0))
            .await
            .unwrap();

        assert!(!client.connect().await);
        assert!(!client.is_connected());
        assert!(matches!(
            client.send_obj(&json!({})).await,
            Err(SocketError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_client_decode_failure_propagates() {
        use tokio::io::AsyncWriteExt;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let peer = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"<message>[1,2,</message>").await.unwrap();
            stream
        });

        let mut client = JsonClient::configure(SocketConfig::new("127.0.0.1", port))
            .await
            .unwrap();
        assert!(client.connect().await);
        assert!(matches!(client.read_obj().await, Err(SocketError::Decode(_))));

        drop(peer.await.unwrap());
    }
}
