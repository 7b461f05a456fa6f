//! Named per-region feature classes for one theme.

use super::{FeatureClass, Theme};
use crate::errors::{ConfigurationError, Result};
use crate::utils::natural_cmp;

/// Feature classes of one theme keyed by final name, kept in natural order.
///
/// A name appears at most once.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedFeatureSet {
    theme: Theme,
    classes: Vec<FeatureClass>,
}

impl NamedFeatureSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            classes: Vec::new(),
        }
    }

    /// The theme.
    #[must_use]
    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Inserts a class. A second class under the same name is an error.
    pub fn insert(&mut self, class: FeatureClass) -> Result<()> {
        match self
            .classes
            .binary_search_by(|c| natural_cmp(&c.name, &class.name))
        {
            Ok(_) => Err(ConfigurationError::new(format!(
                "feature class '{}' already exists in theme {}",
                class.name, self.theme
            ))
            .into()),
            Err(pos) => {
                self.classes.insert(pos, class);
                Ok(())
            }
        }
    }

    /// Class names in natural order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.classes.iter().map(|c| c.name.as_str()).collect()
    }

    /// Classes in natural order.
    pub fn iter(&self) -> impl Iterator<Item = &FeatureClass> {
        self.classes.iter()
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns true if there are no classes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Total number of features across classes.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.classes.iter().map(FeatureClass::len).sum()
    }
}
