//! # Threaded Server
//!
//! Runs a [`JsonServer`]'s serve loop on a background tokio task so the
//! owner can keep working, then stop and join it.
//!
//! ```ignore
//! let mut server = ThreadedServer::bind(config, EchoHandler).await?;
//! server.start()?;
//! // ... talk to it with a JsonClient ...
//! server.stop();
//! server.join().await?;
//! ```
//!
//! [`stop`](ThreadedServer::stop) fires a [`CancellationToken`] that the loop
//! checks every iteration and races against any accept or read in flight, so
//! stopping never waits on a client.

use std::net::SocketAddr;

use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::common::config::SocketConfig;
use crate::common::error::{Result, SocketError};

use super::handler::MessageHandler;
use super::server::JsonServer;

/// A [`JsonServer`] whose loop runs on its own task.
pub struct ThreadedServer<H> {
    /// Present before `start` and again after `join`
    server: Option<JsonServer<H>>,
    worker: Option<JoinHandle<JsonServer<H>>>,
    cancel: CancellationToken,
    started: bool,
    endpoint: String,
    local_addr: Option<SocketAddr>,
}

impl<H> ThreadedServer<H>
where
    H: MessageHandler + 'static,
{
    /// Bind the underlying server. The loop does not run until [`start`](Self::start).
    pub async fn bind(config: SocketConfig, handler: H) -> Result<Self> {
        let endpoint = config.endpoint();
        let server = JsonServer::bind(config, handler).await?;
        let local_addr = server.local_addr();

        Ok(Self {
            server: Some(server),
            worker: None,
            cancel: CancellationToken::new(),
            started: false,
            endpoint,
            local_addr,
        })
    }

    /// Spawn the serve loop.
    ///
    /// # Errors
    /// `AlreadyStarted` if called a second time, even after `join`.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(SocketError::AlreadyStarted);
        }
        let server = self.server.take().ok_or(SocketError::AlreadyStarted)?;
        let cancel = self.cancel.clone();
        self.started = true;

        self.worker = Some(tokio::spawn(run(server, cancel)));
        info!("🚀 Threaded server started on {}", self.display_addr());
        Ok(())
    }

    /// Ask the serve loop to finish. Returns immediately; use
    /// [`join`](Self::join) to wait.
    pub fn stop(&self) {
        info!("🛑 Threaded server stopped on {}", self.display_addr());
        self.cancel.cancel();
    }

    /// Wait for the serve loop to finish. A no-op if the server was never
    /// started or has already been joined.
    ///
    /// Cancel safe: if the returned future is dropped early the worker is
    /// still tracked and can be joined again.
    pub async fn join(&mut self) -> Result<()> {
        if let Some(worker) = self.worker.as_mut() {
            let finished = worker.await;
            self.worker = None;
            self.server = Some(finished.map_err(SocketError::Worker)?);
        }
        Ok(())
    }

    /// True between `start` and `join`.
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Whether the loop ended because the client hung up. Only known once joined.
    pub fn is_shut_down(&self) -> bool {
        self.server.as_ref().is_some_and(JsonServer::is_shut_down)
    }

    /// Address bound at construction, useful when binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bound address when known, so port 0 logs the port actually chosen.
    fn display_addr(&self) -> String {
        self.local_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| self.endpoint.clone())
    }

    /// The server, while it is not running.
    pub fn server(&self) -> Option<&JsonServer<H>> {
        self.server.as_ref()
    }
}

/// Worker entry point: run the serve loop once and hand the server back.
async fn run<H: MessageHandler>(mut server: JsonServer<H>, cancel: CancellationToken) -> JsonServer<H> {
    server.serve_until(&cancel).await;
    server
}
