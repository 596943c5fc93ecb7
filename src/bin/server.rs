//! # Echo Server Binary
//!
//! Thin wrapper that serves the stock [`EchoHandler`] on one address.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin json-socket-server -- --port 5491
//! cargo run --bin json-socket-server -- --config config/echo.toml --threaded
//! ```
//!
//! The server exits when its client disconnects, or on Ctrl-C.

use clap::Parser;
use env_logger::Builder;
use log::{info, LevelFilter};
use std::io::Write;

use json_socket::common::config::{load_config, EndpointConfig};
use json_socket::{EchoHandler, Framing, JsonServer, ThreadedServer};

/// Command-line arguments for the server binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a configuration file (TOML format)
    ///
    /// Example: config/echo.toml
    #[arg(short, long)]
    config: Option<String>,

    /// Address to bind (overrides the config file)
    #[arg(long)]
    address: Option<String>,

    /// Port to bind (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Per-operation timeout in seconds; 0 means non-blocking
    #[arg(long)]
    timeout: Option<f64>,

    /// Wire framing: "marker" or "length-prefixed"
    #[arg(long)]
    framing: Option<Framing>,

    /// Run the serve loop on a background task
    #[arg(long)]
    threaded: bool,

    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

/// Initialize the logging system with timestamp, level, and message formatting.
///
/// Format: `[HH:MM:SS] [LEVEL] message`
fn init_logger(level: LevelFilter) {
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(level)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logger(args.log_level);

    let mut config = match &args.config {
        Some(path) => load_config::<EndpointConfig>(path)?.socket,
        None => Default::default(),
    };
    if let Some(address) = args.address {
        config.address = address;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.timeout.is_some() {
        config.timeout_secs = args.timeout;
    }
    if let Some(framing) = args.framing {
        config.framing = framing;
    }

    if args.threaded {
        let mut server = ThreadedServer::bind(config, EchoHandler).await?;
        server.start()?;

        let interrupted = tokio::select! {
            _ = tokio::signal::ctrl_c() => true,
            result = server.join() => {
                result?;
                false
            }
        };
        if interrupted {
            server.stop();
            server.join().await?;
        }
    } else {
        let mut server = JsonServer::bind(config, EchoHandler).await?;

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            _ = server.serve_loop() => {}
        }
        server.close().await;
    }

    info!("Server exited");
    Ok(())
}
