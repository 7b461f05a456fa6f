//! Pipeline configuration.
//!
//! Every numeric domain constant (intervals, elevation cutoff, length
//! thresholds, tolerances, the stream-order threshold, the tile overlap) is
//! a required field. Deployments disagree on these values, so none of them
//! has a default. Operational knobs such as parallelism do.

use crate::engine::OrderMethod;
use crate::errors::{ConfigurationError, Result, WatershedError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Workspace location.
    pub workspace: WorkspaceConfig,
    /// Cadastral reference layer.
    pub reference: ReferenceConfig,
    /// Tiling parameters.
    pub tiling: TilingConfig,
    /// Contour generation parameters.
    pub contour: ContourConfig,
    /// Flow routing parameters.
    pub hydrology: HydrologyConfig,
    /// Naming parameters.
    pub naming: NamingConfig,
    /// Maximum number of tiles processed concurrently.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Default log filter directive.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Where the workspace lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root directory of the workspace.
    pub root: PathBuf,
}

/// The quarter-section reference layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Feature-class file holding the quarter-section polygons.
    /// Relative paths resolve against the workspace root.
    pub path: PathBuf,
    /// Attribute holding the region code.
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Only regions with a non-empty value in this attribute take part.
    #[serde(default)]
    pub require_field: Option<String>,
}

/// Tiling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilingConfig {
    /// Padding added around every region footprint, in map units.
    pub overlap: f64,
    /// Name prefix for tiles.
    #[serde(default = "default_tile_prefix")]
    pub tile_prefix: String,
    /// Name of the mosaicked source elevation raster.
    #[serde(default = "default_source_dem")]
    pub source_dem: String,
}

/// Contour generation and generalization parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourConfig {
    /// Elevation difference between successive contour lines.
    pub interval: f64,
    /// Highest elevation a contour is generated for.
    pub max_elevation: f64,
    /// Band width for contour polygons.
    pub polygon_interval: f64,
    /// Maximum vertex count per generated feature.
    pub max_vertices: usize,
    /// Lines at or below this length are dropped before generalization.
    pub min_length: f64,
    /// Point-removal tolerance.
    pub simplify_tolerance: f64,
    /// Smoothing tolerance.
    pub smooth_tolerance: f64,
}

/// Flow routing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydrologyConfig {
    /// Cells whose stream order does not exceed this value are discarded.
    pub stream_order_threshold: u32,
    /// Minimum rise imposed on filled flats. Zero leaves them flat.
    pub fill_epsilon: f64,
    /// Stream ordering scheme.
    #[serde(default)]
    pub order_method: OrderMethod,
}

/// Prefix and length filter for one theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeNaming {
    /// Name prefix (`CL`, `CP`, `S`, ...).
    pub prefix: String,
    /// Features at or below this length are not named.
    pub min_length: f64,
}

/// Naming parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Contour lines.
    pub contour_lines: ThemeNaming,
    /// Contour polygons.
    pub contour_polygons: ThemeNaming,
    /// Streams.
    pub streams: ThemeNaming,
    /// Distance within which a vertex on a region boundary counts as inside.
    #[serde(default = "default_containment_tolerance")]
    pub containment_tolerance: f64,
    /// Abort naming on the first orphaned or ambiguous feature.
    #[serde(default)]
    pub strict: bool,
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_id_field() -> String {
    "SEWMAP".to_string()
}

fn default_tile_prefix() -> String {
    "dtm_split_".to_string()
}

fn default_source_dem() -> String {
    "dtm".to_string()
}

fn default_containment_tolerance() -> f64 {
    1e-6
}

impl PipelineConfig {
    /// Loads and validates a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| WatershedError::io(path, e))?;
        Self::from_json(&text)
    }

    /// Parses and validates a JSON document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| ConfigurationError::new(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the workspace root.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace.root = root.into();
        self
    }

    /// Sets the parallelism.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Resolved path of the reference layer.
    #[must_use]
    pub fn reference_path(&self) -> PathBuf {
        if self.reference.path.is_absolute() {
            self.reference.path.clone()
        } else {
            self.workspace.root.join(&self.reference.path)
        }
    }

    /// Checks every parameter before any stage runs.
    pub fn validate(&self) -> Result<()> {
        positive(self.contour.interval, "contour.interval")?;
        positive(self.contour.polygon_interval, "contour.polygon_interval")?;
        finite(self.contour.max_elevation, "contour.max_elevation")?;
        non_negative(self.contour.min_length, "contour.min_length")?;
        non_negative(self.contour.simplify_tolerance, "contour.simplify_tolerance")?;
        non_negative(self.contour.smooth_tolerance, "contour.smooth_tolerance")?;
        non_negative(self.tiling.overlap, "tiling.overlap")?;
        non_negative(self.hydrology.fill_epsilon, "hydrology.fill_epsilon")?;
        non_negative(self.naming.containment_tolerance, "naming.containment_tolerance")?;

        if self.contour.max_vertices < 2 {
            return Err(ConfigurationError::new("max_vertices must be at least 2")
                .with_field("contour.max_vertices")
                .into());
        }
        if self.parallelism == 0 {
            return Err(ConfigurationError::new("parallelism must be at least 1")
                .with_field("parallelism")
                .into());
        }
        not_blank(&self.reference.id_field, "reference.id_field")?;
        not_blank(&self.tiling.tile_prefix, "tiling.tile_prefix")?;
        not_blank(&self.tiling.source_dem, "tiling.source_dem")?;

        let themes = [
            ("naming.contour_lines", &self.naming.contour_lines),
            ("naming.contour_polygons", &self.naming.contour_polygons),
            ("naming.streams", &self.naming.streams),
        ];
        for (field, theme) in &themes {
            not_blank(&theme.prefix, field)?;
            non_negative(theme.min_length, field)?;
            if theme.prefix.chars().any(|c| !c.is_ascii_alphanumeric()) {
                return Err(ConfigurationError::new(format!(
                    "prefix '{}' must be alphanumeric",
                    theme.prefix
                ))
                .with_field(*field)
                .into());
            }
        }
        for (i, (field, a)) in themes.iter().enumerate() {
            if themes[i + 1..].iter().any(|(_, b)| b.prefix == a.prefix) {
                return Err(ConfigurationError::new(format!("prefix '{}' is used twice", a.prefix))
                    .with_field(*field)
                    .into());
            }
        }
        Ok(())
    }
}

fn positive(value: f64, field: &str) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::new(format!("{field} must be positive, got {value}"))
            .with_field(field)
            .into())
    }
}

fn non_negative(value: f64, field: &str) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::new(format!("{field} must not be negative, got {value}"))
            .with_field(field)
            .into())
    }
}

fn finite(value: f64, field: &str) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigurationError::new(format!("{field} must be finite"))
            .with_field(field)
            .into())
    }
}

fn not_blank(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(ConfigurationError::new(format!("{field} must not be empty"))
            .with_field(field)
            .into())
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> serde_json::Value {
        json!({
            "workspace": { "root": "/data/watershed" },
            "reference": { "path": "reference/quarter_sections.fc.json", "require_field": "SEWMAPOLD" },
            "tiling": { "overlap": 1.0 },
            "contour": {
                "interval": 1.0,
                "max_elevation": 564.0,
                "polygon_interval": 3.0,
                "max_vertices": 1_000_000,
                "min_length": 350.0,
                "simplify_tolerance": 5.0,
                "smooth_tolerance": 5.0
            },
            "hydrology": { "stream_order_threshold": 5, "fill_epsilon": 0.0 },
            "naming": {
                "contour_lines": { "prefix": "CL", "min_length": 250.0 },
                "contour_polygons": { "prefix": "CP", "min_length": 250.0 },
                "streams": { "prefix": "S", "min_length": 60.0 }
            },
            "parallelism": 4
        })
    }

    #[test]
    fn test_parses_and_applies_operational_defaults() {
        let config = PipelineConfig::from_json(&document().to_string()).unwrap();
        assert_eq!(config.reference.id_field, "SEWMAP");
        assert_eq!(config.tiling.tile_prefix, "dtm_split_");
        assert_eq!(config.naming.containment_tolerance, 1e-6);
        assert!(!config.naming.strict);
        assert_eq!(config.hydrology.order_method, OrderMethod::Strahler);
        assert_eq!(
            config.reference_path(),
            PathBuf::from("/data/watershed/reference/quarter_sections.fc.json")
        );
    }

    #[test]
    fn test_domain_constants_are_required() {
        let mut doc = document();
        doc["contour"].as_object_mut().unwrap().remove("interval");
        let err = PipelineConfig::from_json(&doc.to_string()).unwrap_err();
        assert!(err.to_string().contains("interval"));
    }

    #[test]
    fn test_rejects_non_positive_interval() {
        let mut doc = document();
        doc["contour"]["interval"] = json!(0.0);
        match PipelineConfig::from_json(&doc.to_string()) {
            Err(WatershedError::Configuration(e)) => {
                assert_eq!(e.field.as_deref(), Some("contour.interval"));
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_order_method_can_be_selected() {
        let mut doc = document();
        doc["hydrology"]["order_method"] = json!("shreve");
        let config = PipelineConfig::from_json(&doc.to_string()).unwrap();
        assert_eq!(config.hydrology.order_method, OrderMethod::Shreve);
    }

    #[test]
    fn test_rejects_duplicate_prefix() {
        let mut doc = document();
        doc["naming"]["streams"]["prefix"] = json!("CL");
        assert!(PipelineConfig::from_json(&doc.to_string()).is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = PipelineConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert_eq!(err.category(), "IOError");
    }
}
