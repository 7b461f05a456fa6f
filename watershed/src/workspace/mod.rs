//! The on-disk workspace.
//!
//! A [`Workspace`] is an explicit handle passed to every operation. Rasters
//! are stored as `<name>.raster.json` and feature classes as
//! `<name>.fc.json` under the directory of their [`Location`]. Files are
//! written to a temporary sibling and renamed into place, so an interrupted
//! write never leaves a truncated artifact behind.

mod checkpoints;
mod location;

pub use checkpoints::CheckpointStore;
pub use location::Location;

use crate::core::{FeatureClass, GeometryKind, VectorFeature};
use crate::errors::{Result, WatershedError};
use crate::raster::{Raster, RasterElement};
use crate::utils::natural_sort;
use parking_lot::{Mutex, MutexGuard};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const RASTER_SUFFIX: &str = ".raster.json";
const CLASS_SUFFIX: &str = ".fc.json";

/// Attribute naming the unit a feature was produced by.
pub const SOURCE_ATTRIBUTE: &str = "source";

/// Handle to a workspace directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl Workspace {
    /// Creates a handle. Directories are created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a location.
    #[must_use]
    pub fn dir(&self, location: Location) -> PathBuf {
        self.root.join(location.relative_path())
    }

    /// Path of a raster.
    #[must_use]
    pub fn raster_path(&self, location: Location, name: &str) -> PathBuf {
        self.dir(location).join(format!("{name}{RASTER_SUFFIX}"))
    }

    /// Path of a feature class.
    #[must_use]
    pub fn class_path(&self, location: Location, name: &str) -> PathBuf {
        self.dir(location).join(format!("{name}{CLASS_SUFFIX}"))
    }

    /// Serializes writes into shared locations.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock()
    }

    /// Writes a raster, replacing any previous one.
    pub fn write_raster<T: RasterElement>(&self, location: Location, name: &str, raster: &Raster<T>) -> Result<()> {
        write_json(&self.raster_path(location, name), raster)
    }

    /// Reads a raster.
    pub fn read_raster<T: RasterElement>(&self, location: Location, name: &str) -> Result<Raster<T>> {
        read_json(&self.raster_path(location, name))
    }

    /// Writes a feature class under its own name, replacing any previous one.
    pub fn write_class(&self, location: Location, class: &FeatureClass) -> Result<()> {
        write_json(&self.class_path(location, &class.name), class)
    }

    /// Reads a feature class.
    pub fn read_class(&self, location: Location, name: &str) -> Result<FeatureClass> {
        read_json(&self.class_path(location, name))
    }

    /// Returns true if the raster exists.
    #[must_use]
    pub fn has_raster(&self, location: Location, name: &str) -> bool {
        self.raster_path(location, name).is_file()
    }

    /// Returns true if the feature class exists.
    #[must_use]
    pub fn has_class(&self, location: Location, name: &str) -> bool {
        self.class_path(location, name).is_file()
    }

    /// Raster names in natural order.
    pub fn list_rasters(&self, location: Location) -> Result<Vec<String>> {
        self.list(location, RASTER_SUFFIX)
    }

    /// Feature-class names in natural order.
    pub fn list_classes(&self, location: Location) -> Result<Vec<String>> {
        self.list(location, CLASS_SUFFIX)
    }

    /// Deletes a feature class if it exists.
    pub fn delete_class(&self, location: Location, name: &str) -> Result<()> {
        remove_if_present(&self.class_path(location, name))
    }

    /// Deletes every file in a location. A missing or empty location is a
    /// no-op. Returns the number of files removed.
    pub fn clear(&self, location: Location) -> Result<usize> {
        let dir = self.dir(location);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(WatershedError::io(&dir, e)),
        };
        let mut removed = 0;
        for entry in entries {
            let path = entry.map_err(|e| WatershedError::io(&dir, e))?.path();
            if path.is_file() {
                std::fs::remove_file(&path).map_err(|e| WatershedError::io(&path, e))?;
                removed += 1;
            }
        }
        debug!(location = %location, removed, "Cleared location");
        Ok(removed)
    }

    /// Replaces the features a unit contributed to a shared class.
    ///
    /// Features previously tagged with `source` are removed, then `features`
    /// are appended with that tag. Re-running the same unit therefore leaves
    /// the class unchanged. Returns the class size afterwards.
    pub fn upsert_contribution(
        &self,
        location: Location,
        name: &str,
        kind: GeometryKind,
        source: &str,
        features: Vec<VectorFeature>,
    ) -> Result<usize> {
        let _guard = self.lock();
        let mut class = if self.has_class(location, name) {
            self.read_class(location, name)?
        } else {
            FeatureClass::new(name, kind)
        };
        class.features.retain(|f| {
            f.attribute(SOURCE_ATTRIBUTE)
                .map_or(true, |v| v.as_text() != source)
        });
        class
            .features
            .extend(features.into_iter().map(|f| f.with_attribute(SOURCE_ATTRIBUTE, source)));
        self.write_class(location, &class)?;
        Ok(class.len())
    }

    /// Checkpoint storage for this workspace.
    #[must_use]
    pub fn checkpoints(&self) -> CheckpointStore {
        CheckpointStore::new(self.clone())
    }

    fn list(&self, location: Location, suffix: &str) -> Result<Vec<String>> {
        let dir = self.dir(location);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(WatershedError::io(&dir, e)),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| WatershedError::io(&dir, e))?;
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_str().and_then(|n| n.strip_suffix(suffix)) {
                names.push(name.to_string());
            }
        }
        natural_sort(&mut names);
        Ok(names)
    }
}

pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| WatershedError::io(parent, e))?;
    }
    let bytes = serde_json::to_vec(value)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes).map_err(|e| WatershedError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| WatershedError::io(path, e))
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).map_err(|e| WatershedError::io(path, e))?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(WatershedError::io(path, e)),
    }
}
