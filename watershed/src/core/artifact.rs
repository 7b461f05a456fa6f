//! Artifacts written by stages.

use crate::workspace::Location;
use serde::{Deserialize, Serialize};

/// Something a stage wrote into the workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    /// A raster.
    Raster {
        /// Where it was written.
        location: Location,
        /// Raster name.
        name: String,
    },
    /// A feature class.
    Features {
        /// Where it was written.
        location: Location,
        /// Class name.
        name: String,
        /// Features written.
        count: usize,
        /// Features the engine discarded while producing it.
        #[serde(default)]
        discarded: usize,
    },
}

impl Artifact {
    /// A raster artifact.
    pub fn raster(location: Location, name: impl Into<String>) -> Self {
        Self::Raster {
            location,
            name: name.into(),
        }
    }

    /// A feature-class artifact.
    pub fn features(location: Location, name: impl Into<String>, count: usize) -> Self {
        Self::Features {
            location,
            name: name.into(),
            count,
            discarded: 0,
        }
    }

    /// Sets the discarded count on a feature-class artifact.
    #[must_use]
    pub fn with_discarded(mut self, n: usize) -> Self {
        if let Self::Features { discarded, .. } = &mut self {
            *discarded = n;
        }
        self
    }

    /// The artifact name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Raster { name, .. } | Self::Features { name, .. } => name,
        }
    }

    /// The artifact location.
    #[must_use]
    pub fn location(&self) -> Location {
        match self {
            Self::Raster { location, .. } | Self::Features { location, .. } => *location,
        }
    }
}
