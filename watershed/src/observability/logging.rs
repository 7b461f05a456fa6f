//! Subscriber installation.
//!
//! Every run logs to the console and to a persistent file. Both streams use
//! the same timestamp format and filter.

use crate::errors::{Result, WatershedError};
use parking_lot::Mutex;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Timestamp format used by every log line.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Where and how to log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Log file, truncated on open. `None` logs to the console only.
    pub file: Option<PathBuf>,
    /// Write the file as JSON lines instead of text.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            json: false,
        }
    }
}

impl LogConfig {
    /// Console-only logging at `level`.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Self::default()
        }
    }

    /// Also logs to `path`.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Writes the file as JSON lines.
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

/// Installs the global subscriber.
///
/// Fails if the log file cannot be created or a subscriber is already set.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| WatershedError::io(parent, e))?;
            }
            let file = Arc::new(std::fs::File::create(path).map_err(|e| WatershedError::io(path, e))?);
            let timer = ChronoLocal::new(TIME_FORMAT.to_string());
            Some(if config.json {
                fmt::layer().json().with_timer(timer).with_writer(file).boxed()
            } else {
                fmt::layer().with_ansi(false).with_timer(timer).with_writer(file).boxed()
            })
        }
        None => None,
    };

    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console)
        .with(filter)
        .try_init()
        .map_err(|e| WatershedError::unexpected(format!("logging already initialized: {e}")))
}

/// In-memory log target, for asserting on log output.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl LogBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    /// A subscriber writing plain text into this buffer.
    #[must_use]
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        let buffer = self.clone();
        fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
            .with_writer(move || buffer.clone())
            .finish()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
