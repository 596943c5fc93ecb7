//! # Configuration Utilities
//!
//! Shared configuration used by both the server and the client, plus the
//! generic TOML loader the binaries use.
//!
//! ## Example file
//!
//! ```toml
//! [socket]
//! address = "127.0.0.1"
//! port = 64000
//! timeout_secs = 5.0
//! framing = "marker"
//! ```
//!
//! Every key is optional; omitted keys fall back to [`SocketConfig::default`].

use std::fmt;
use std::fs;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{Result, SocketError};

/// Default bind/connect address.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
/// Default bind/connect port.
pub const DEFAULT_PORT: u16 = 64000;
/// Default cap on a single frame (16 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Load a TOML configuration file and deserialize it into the specified type.
///
/// # Arguments
/// - `path`: Path to the TOML configuration file
///
/// # Example
/// ```ignore
/// let config: EndpointConfig = load_config("config/echo.toml")?;
/// ```
pub fn load_config<T>(path: &str) -> anyhow::Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)?;
    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Top-level layout of a configuration file: one `[socket]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub socket: SocketConfig,
}

/// Wire framing used on a connection. Both peers must agree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    /// `<message>` + JSON + `</message>`, no length prefix.
    #[default]
    Marker,
    /// 4-byte big-endian length followed by the JSON payload.
    LengthPrefixed,
}

impl FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "marker" => Ok(Framing::Marker),
            "length-prefixed" => Ok(Framing::LengthPrefixed),
            other => Err(format!(
                "unknown framing '{}' (expected 'marker' or 'length-prefixed')",
                other
            )),
        }
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framing::Marker => f.write_str("marker"),
            Framing::LengthPrefixed => f.write_str("length-prefixed"),
        }
    }
}

/// Address, port, timeout and framing for one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Host name or IP literal to bind (server) or connect to (client)
    pub address: String,
    /// TCP port; `0` lets the OS pick one when binding
    pub port: u16,
    /// Per-operation timeout in seconds. See [`SocketTimeout`] for how
    /// `None`, `0` and positive values are interpreted.
    pub timeout_secs: Option<f64>,
    pub framing: Framing,
    /// Largest frame accepted by `receive`
    pub max_frame_bytes: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            timeout_secs: None,
            framing: Framing::Marker,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl SocketConfig {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_timeout_secs(mut self, secs: f64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_max_frame_bytes(mut self, max: usize) -> Self {
        self.max_frame_bytes = max;
        self
    }

    /// Validate and convert `timeout_secs`.
    pub fn timeout(&self) -> Result<SocketTimeout> {
        SocketTimeout::from_secs(self.timeout_secs)
    }

    /// `address:port`, as used in log lines and error messages.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// How long a single socket operation may wait.
///
/// **A timeout of `0` means non-blocking, not "wait forever".** With
/// [`SocketTimeout::NonBlocking`] every accept, read and write is attempted
/// exactly once and fails with a timeout error if it cannot complete
/// immediately. A server loop configured this way spins between attempts.
/// Leave `timeout_secs` unset to block indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketTimeout {
    /// Wait as long as it takes.
    Blocking,
    /// Try once, never wait.
    NonBlocking,
    /// Wait at most this long.
    Bounded(Duration),
}

impl SocketTimeout {
    pub fn from_secs(secs: Option<f64>) -> Result<Self> {
        match secs {
            None => Ok(SocketTimeout::Blocking),
            Some(s) if s == 0.0 => Ok(SocketTimeout::NonBlocking),
            Some(s) => Duration::try_from_secs_f64(s)
                .map(SocketTimeout::Bounded)
                .map_err(|_| SocketError::InvalidTimeout(s)),
        }
    }

    /// The wait limit, or `None` when blocking indefinitely.
    pub fn limit(&self) -> Option<Duration> {
        match self {
            SocketTimeout::Blocking => None,
            SocketTimeout::NonBlocking => Some(Duration::ZERO),
            SocketTimeout::Bounded(d) => Some(*d),
        }
    }

    /// Drive `fut` under this timeout. `Err` carries the limit that elapsed.
    ///
    /// A zero limit still polls `fut` once, which is what gives
    /// [`SocketTimeout::NonBlocking`] its try-once behaviour.
    pub(crate) async fn apply<F>(self, fut: F) -> std::result::Result<F::Output, Duration>
    where
        F: Future,
    {
        match self.limit() {
            None => Ok(fut.await),
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| limit),
        }
    }
}
