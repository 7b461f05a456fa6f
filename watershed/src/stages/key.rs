//! Checkpoint identities.

use super::TileOp;
use crate::core::Theme;
use std::fmt;

/// Identifies a checkpointed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKey {
    /// Splitting the source DEM into tiles.
    Split,
    /// A per-tile operation.
    Tile(TileOp),
    /// Mosaicking the direction tiles.
    MergeDirection,
    /// Stream order over the mosaic.
    Order,
    /// Thresholding stream order.
    Condition,
    /// Vectorizing the stream network.
    StreamExtract,
    /// Splitting the network by region.
    SplitByRegion,
    /// Naming a theme's features.
    Naming(Theme),
    /// Merging a theme's named classes.
    Merge(Theme),
}

impl StageKey {
    /// The key as stored in checkpoint files and reports.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Split => "split".to_string(),
            Self::Tile(op) => op.key().to_string(),
            Self::MergeDirection => "merge_direction".to_string(),
            Self::Order => "stream_order".to_string(),
            Self::Condition => "condition".to_string(),
            Self::StreamExtract => "stream_to_feature".to_string(),
            Self::SplitByRegion => "split_by_region".to_string(),
            Self::Naming(theme) => format!("naming_{}", theme.key()),
            Self::Merge(theme) => format!("merge_{}", theme.key()),
        }
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_are_distinct() {
        let mut keys: Vec<StageKey> = vec![
            StageKey::Split,
            StageKey::MergeDirection,
            StageKey::Order,
            StageKey::Condition,
            StageKey::StreamExtract,
            StageKey::SplitByRegion,
        ];
        keys.extend(TileOp::ALL.map(StageKey::Tile));
        keys.extend(Theme::ALL.map(StageKey::Naming));
        keys.extend(Theme::ALL.map(StageKey::Merge));
        let names: HashSet<String> = keys.iter().map(StageKey::name).collect();
        assert_eq!(names.len(), keys.len());
    }

    #[test]
    fn test_theme_keys() {
        assert_eq!(StageKey::Naming(Theme::Streams).to_string(), "naming_streams");
        assert_eq!(StageKey::Merge(Theme::ContourLines).to_string(), "merge_contour_lines");
    }
}
