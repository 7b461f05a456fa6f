//! Core data model: tiles, features, regions, checkpoints and reports.

mod artifact;
mod checkpoint;
mod feature;
mod named;
mod output;
mod region;
mod status;
mod theme;
mod tile;

pub use artifact::Artifact;
pub use checkpoint::ProcessingCheckpoint;
pub use feature::{line_length, AttributeValue, FeatureClass, GeometryKind, VectorFeature};
pub use named::NamedFeatureSet;
pub use output::StageReport;
pub use region::{QuarterSection, RegionLayer};
pub use status::StageStatus;
pub use theme::Theme;
pub use tile::{RasterTile, TileId};
