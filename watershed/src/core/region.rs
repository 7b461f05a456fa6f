//! Quarter-section reference regions.

use super::{FeatureClass, GeometryKind};
use crate::errors::{ConfigurationError, Result};
use crate::raster::Extent;
use crate::utils::natural_cmp;
use geo::{Area, BoundingRect, Geometry, Polygon};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A cadastral reference polygon with a unique code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterSection {
    /// Region code, e.g. `12-34-NE`.
    pub code: String,
    /// Region footprint.
    pub polygon: Polygon<f64>,
}

impl QuarterSection {
    /// Creates a region.
    pub fn new(code: impl Into<String>, polygon: Polygon<f64>) -> Self {
        Self {
            code: code.into(),
            polygon,
        }
    }

    /// Bounding extent of the footprint.
    #[must_use]
    pub fn extent(&self) -> Option<Extent> {
        self.polygon.bounding_rect().map(Extent::from)
    }
}

/// The validated set of reference regions, in natural code order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionLayer {
    sections: Vec<QuarterSection>,
}

impl RegionLayer {
    /// Validates regions and sorts them by code.
    ///
    /// Fails on an empty layer, a degenerate polygon, a blank code or a
    /// repeated code.
    pub fn new(mut sections: Vec<QuarterSection>) -> Result<Self> {
        if sections.is_empty() {
            return Err(ConfigurationError::new("reference layer contains no regions")
                .with_field("reference")
                .into());
        }
        let mut seen = HashSet::new();
        for section in &sections {
            if section.code.trim().is_empty() {
                return Err(ConfigurationError::new("reference region with a blank code")
                    .with_field("reference")
                    .into());
            }
            if section.polygon.exterior().0.len() < 4 || section.polygon.unsigned_area() <= 0.0 {
                return Err(ConfigurationError::new(format!(
                    "reference region '{}' has degenerate geometry",
                    section.code
                ))
                .with_field("reference")
                .into());
            }
            if !seen.insert(section.code.clone()) {
                return Err(ConfigurationError::new(format!(
                    "reference region code '{}' is not unique",
                    section.code
                ))
                .with_field("reference")
                .into());
            }
        }
        sections.sort_by(|a, b| natural_cmp(&a.code, &b.code));
        Ok(Self { sections })
    }

    /// Reads regions from a polygon feature class.
    ///
    /// `id_field` holds the code. When `require_field` is set, features
    /// whose value for it is missing or blank are left out.
    pub fn from_feature_class(
        class: &FeatureClass,
        id_field: &str,
        require_field: Option<&str>,
    ) -> Result<Self> {
        if class.kind != GeometryKind::Polygon {
            return Err(ConfigurationError::new(format!(
                "reference layer '{}' is not a polygon class",
                class.name
            ))
            .with_field("reference")
            .into());
        }
        let mut sections = Vec::new();
        for (index, feature) in class.features.iter().enumerate() {
            if let Some(field) = require_field {
                let present = feature
                    .attribute(field)
                    .is_some_and(|v| !v.as_text().trim().is_empty());
                if !present {
                    continue;
                }
            }
            let code = feature
                .attribute(id_field)
                .map(|v| v.as_text())
                .ok_or_else(|| {
                    ConfigurationError::new(format!(
                        "reference feature {index} has no '{id_field}' attribute"
                    ))
                    .with_field("reference.id_field")
                })?;
            let polygon = match &feature.geometry {
                Geometry::Polygon(p) => p.clone(),
                Geometry::MultiPolygon(mp) if mp.0.len() == 1 => mp.0[0].clone(),
                _ => {
                    return Err(ConfigurationError::new(format!(
                        "reference region '{code}' is not a single polygon"
                    ))
                    .with_field("reference")
                    .into())
                }
            };
            sections.push(QuarterSection::new(code, polygon));
        }
        Self::new(sections)
    }

    /// Regions in code order.
    #[must_use]
    pub fn sections(&self) -> &[QuarterSection] {
        &self.sections
    }

    /// Looks up a region by code.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&QuarterSection> {
        self.sections.iter().find(|s| s.code == code)
    }

    /// Number of regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Always false for a validated layer.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
