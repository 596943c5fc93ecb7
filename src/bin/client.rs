//! # Client Binary
//!
//! Sends each JSON document given on the command line to a server and prints
//! the reply.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin json-socket-client -- --port 5491 '{"message": "new connection"}' '{"echo": "hello", "i": 1}'
//! ```

use anyhow::{bail, Context};
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;

use json_socket::common::config::{load_config, EndpointConfig};
use json_socket::{Framing, JsonClient, Message};

/// Command-line arguments for the client binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a configuration file (TOML format)
    #[arg(short, long)]
    config: Option<String>,

    /// Server address (overrides the config file)
    #[arg(long)]
    address: Option<String>,

    /// Server port (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Per-operation timeout in seconds; 0 means non-blocking
    #[arg(long)]
    timeout: Option<f64>,

    /// Wire framing: "marker" or "length-prefixed"
    #[arg(long)]
    framing: Option<Framing>,

    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// JSON documents to send, one exchange each
    #[arg(default_value = r#"{"message": "new connection"}"#)]
    messages: Vec<String>,
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

    let messages = args
        .messages
        .iter()
        .map(|text| {
            serde_json::from_str::<Message>(text)
                .with_context(|| format!("'{}' is not valid JSON", text))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

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

    let endpoint = config.endpoint();
    let mut client = JsonClient::configure(config).await?;
    if !client.connect().await {
        bail!("could not connect to {}", endpoint);
    }

    for message in &messages {
        client.send_obj(message).await?;
        match client.read_obj().await? {
            Some(reply) => println!("{}", reply),
            None => {
                println!("Server closed the connection");
                break;
            }
        }
    }

    client.close().await;
    Ok(())
}
