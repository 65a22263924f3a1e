//! Daemon configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables (`RELAY_HOST`, `RELAY_PORT`), then command-line
//! flags applied by the binary. `validate` must pass before the config is
//! used to build a codec or a history buffer.
//!
//! # Example
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 7410
//! delimiter = "\r\n"
//! history_capacity = 10
//! max_line_length = 16384
//! write_timeout_ms = 10000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use relay_core::{DomainError, HistoryBuffer, DEFAULT_HISTORY_CAPACITY};
use relay_protocol::{LineCodec, DEFAULT_MAX_LINE_LENGTH};

/// Default TCP port
pub const DEFAULT_PORT: u16 = 7410;

/// Default bind address
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default per-line write timeout in milliseconds
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 10_000;

/// Environment variable overriding the bind address
pub const HOST_ENV: &str = "RELAY_HOST";

/// Environment variable overriding the port
pub const PORT_ENV: &str = "RELAY_PORT";

/// Relay daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Address the listener binds to.
    pub host: String,

    /// TCP port; 0 picks an ephemeral port.
    pub port: u16,

    /// Line delimiter for both directions.
    pub delimiter: String,

    /// Number of broadcast messages replayed to newly logged-in clients.
    pub history_capacity: usize,

    /// Maximum inbound line length in bytes, delimiter excluded.
    pub max_line_length: usize,

    /// How long one outbound line may take to write before the client is
    /// disconnected.
    pub write_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            delimiter: "\r\n".to_string(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
        }
    }
}

impl RelayConfig {
    /// Parses a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::InvalidToml(e.to_string()))
    }

    /// Loads a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Applies `RELAY_HOST` / `RELAY_PORT` from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides using `lookup` to read variables.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(HOST_ENV) {
            self.host = host;
        }

        if let Some(port) = lookup(PORT_ENV) {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port))?;
        }

        Ok(())
    }

    /// Checks values that would otherwise fail later at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delimiter.is_empty() {
            return Err(ConfigError::EmptyDelimiter);
        }
        if self.max_line_length == 0 {
            return Err(ConfigError::ZeroMaxLineLength);
        }
        if self.write_timeout_ms == 0 {
            return Err(ConfigError::ZeroWriteTimeout);
        }
        HistoryBuffer::new(self.history_capacity)?;
        Ok(())
    }

    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Builds the line codec for a connection.
    pub fn codec(&self) -> LineCodec {
        LineCodec::with_delimiter(self.delimiter.as_bytes().to_vec(), self.max_line_length)
    }

    /// Per-line write timeout for connection writers.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Builds an empty history buffer with the configured capacity.
    pub fn history(&self) -> Result<HistoryBuffer, ConfigError> {
        Ok(HistoryBuffer::new(self.history_capacity)?)
    }
}

/// Expands `\r`, `\n`, `\t` and `\\` escapes typed on a command line.
///
/// Unknown escapes are kept verbatim.
pub fn unescape_delimiter(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

/// Errors that can occur while building the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {error}", path.display())]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config file {}: {error}", path.display())]
    Parse { path: PathBuf, error: String },

    #[error("Failed to parse config: {0}")]
    InvalidToml(String),

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Line delimiter must not be empty")]
    EmptyDelimiter,

    #[error("Maximum line length must be at least 1")]
    ZeroMaxLineLength,

    #[error("Write timeout must be at least 1 ms")]
    ZeroWriteTimeout,

    #[error(transparent)]
    Domain(#[from] DomainError),
}
