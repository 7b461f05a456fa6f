//! Vector features and feature classes.

use crate::raster::Lineage;
use geo::{Geometry, LineString, Polygon};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// Text value.
    Text(String),
}

impl AttributeValue {
    /// Returns the value as text. Numbers are formatted.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Text(v) => v.clone(),
        }
    }

    /// Returns the value as a float, if numeric.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for AttributeValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Geometry type of a feature class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryKind {
    /// Polylines.
    Line,
    /// Polygons.
    Polygon,
}

/// A geometry with ordered attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorFeature {
    /// The geometry.
    pub geometry: Geometry<f64>,
    /// Attributes by name.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl VectorFeature {
    /// Creates a feature without attributes.
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: geometry.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Replaces the geometry, keeping attributes.
    #[must_use]
    pub fn with_geometry(&self, geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: geometry.into(),
            attributes: self.attributes.clone(),
        }
    }

    /// Looks up an attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Line length, or perimeter for polygons.
    #[must_use]
    pub fn length(&self) -> f64 {
        geometry_length(&self.geometry)
    }
}

/// Planar length of a line string.
#[must_use]
pub fn line_length(ls: &LineString<f64>) -> f64 {
    ls.lines().map(|l| l.dx().hypot(l.dy())).sum()
}

fn polygon_perimeter(p: &Polygon<f64>) -> f64 {
    line_length(p.exterior()) + p.interiors().iter().map(line_length).sum::<f64>()
}

fn geometry_length(geometry: &Geometry<f64>) -> f64 {
    match geometry {
        Geometry::LineString(ls) => line_length(ls),
        Geometry::MultiLineString(mls) => mls.0.iter().map(line_length).sum(),
        Geometry::Polygon(p) => polygon_perimeter(p),
        Geometry::MultiPolygon(mp) => mp.0.iter().map(polygon_perimeter).sum(),
        Geometry::Line(l) => l.dx().hypot(l.dy()),
        Geometry::GeometryCollection(gc) => gc.0.iter().map(geometry_length).sum(),
        _ => 0.0,
    }
}

/// A named, ordered collection of features of one geometry kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureClass {
    /// Class name.
    pub name: String,
    /// Geometry kind.
    pub kind: GeometryKind,
    /// Tile lineage, for classes derived from a single tile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineage: Option<Lineage>,
    /// Features in insertion order.
    pub features: Vec<VectorFeature>,
}

impl FeatureClass {
    /// Creates an empty class.
    pub fn new(name: impl Into<String>, kind: GeometryKind) -> Self {
        Self {
            name: name.into(),
            kind,
            lineage: None,
            features: Vec::new(),
        }
    }

    /// Sets the lineage.
    #[must_use]
    pub fn with_lineage(mut self, lineage: Option<Lineage>) -> Self {
        self.lineage = lineage;
        self
    }

    /// Sets the features.
    #[must_use]
    pub fn with_features(mut self, features: Vec<VectorFeature>) -> Self {
        self.features = features;
        self
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns true if the class holds no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Sum of feature lengths.
    #[must_use]
    pub fn total_length(&self) -> f64 {
        self.features.iter().map(VectorFeature::length).sum()
    }
}
