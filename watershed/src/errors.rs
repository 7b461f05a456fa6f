//! Error types for the watershed pipeline.
//!
//! Configuration problems are caught before any engine call. I/O problems
//! name the offending path. Engine failures carry the engine's diagnostic
//! text verbatim.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WatershedError>;

/// The main error type for watershed operations.
#[derive(Debug, Error)]
pub enum WatershedError {
    /// Invalid configuration, caught before any engine call.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A path is missing or cannot be written.
    #[error("IO error at '{}': {source}", .path.display())]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The geospatial engine reported a failure.
    #[error("{0}")]
    Engine(#[from] ExternalEngineError),

    /// A feature is completely contained by more than one region.
    #[error("{0}")]
    AmbiguousMatch(#[from] AmbiguousMatchError),

    /// A feature is not completely contained by any region.
    #[error("{0}")]
    OrphanedFeature(#[from] OrphanedFeatureError),

    /// Anything else.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl WatershedError {
    /// Creates an IO error for a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an unexpected error.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Short category name, used in logs and reports.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ConfigurationError",
            Self::Io { .. } => "IOError",
            Self::Engine(_) => "ExternalEngineError",
            Self::AmbiguousMatch(_) => "AmbiguousMatchError",
            Self::OrphanedFeature(_) => "OrphanedFeatureError",
            Self::Unexpected(_) => "UnexpectedError",
        }
    }

    /// Returns true if the failure is confined to a single work unit.
    ///
    /// Only engine failures raised while processing a named unit qualify;
    /// everything at or after a barrier is pipeline-fatal.
    #[must_use]
    pub fn is_tile_local(&self) -> bool {
        matches!(self, Self::Engine(e) if e.unit.is_some())
    }

    /// Converts to a dictionary representation for reports.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.category()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map.insert("tile_local".to_string(), serde_json::json!(self.is_tile_local()));
        map
    }
}

/// Error raised when configuration is invalid.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("Configuration error: {message}")]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// The configuration field or stage key involved, if any.
    pub field: Option<String>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    /// Sets the field involved.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// Error reported by the geospatial engine.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("Engine error in {operation}{}: {diagnostic}", .unit.as_ref().map(|u| format!(" [{u}]")).unwrap_or_default())]
pub struct ExternalEngineError {
    /// The engine operation that failed.
    pub operation: String,
    /// The work unit being processed, if the failure is unit-local.
    pub unit: Option<String>,
    /// The engine's diagnostic text, verbatim.
    pub diagnostic: String,
}

impl ExternalEngineError {
    /// Creates a new engine error.
    #[must_use]
    pub fn new(operation: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            unit: None,
            diagnostic: diagnostic.into(),
        }
    }

    /// Attaches the work unit the failure occurred on.
    #[must_use]
    pub fn for_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// A feature matched more than one completely-containing region.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[error("Ambiguous match: feature {feature_index} of '{source_class}' is contained by regions [{}]", .candidates.join(", "))]
pub struct AmbiguousMatchError {
    /// The class the feature came from.
    pub source_class: String,
    /// The feature's position in its class.
    pub feature_index: usize,
    /// Codes of every region that completely contains the feature.
    pub candidates: Vec<String>,
}

/// A feature is not completely contained by any region.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[error("Orphaned feature: feature {feature_index} of '{source_class}' (length {length:.2}) has no containing region")]
pub struct OrphanedFeatureError {
    /// The class the feature came from.
    pub source_class: String,
    /// The feature's position in its class.
    pub feature_index: usize,
    /// The feature's length (or perimeter).
    pub length: f64,
}

impl From<serde_json::Error> for WatershedError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unexpected(format!("Serialization error: {err}"))
    }
}

impl From<tokio::task::JoinError> for WatershedError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Unexpected(format!("Task join error: {err}"))
    }
}
