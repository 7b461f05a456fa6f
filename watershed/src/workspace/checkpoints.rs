//! Checkpoint persistence.

use super::{read_json, write_json, Location, Workspace};
use crate::core::ProcessingCheckpoint;
use crate::errors::{Result, WatershedError};

/// Reads and writes per-stage checkpoints.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    workspace: Workspace,
}

impl CheckpointStore {
    pub(super) fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    fn path(&self, stage: &str) -> std::path::PathBuf {
        self.workspace
            .dir(Location::Checkpoints)
            .join(format!("{stage}.json"))
    }

    /// Loads a stage checkpoint, if one was saved.
    pub fn load(&self, stage: &str) -> Result<Option<ProcessingCheckpoint>> {
        let path = self.path(stage);
        if !path.is_file() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    /// Saves a checkpoint.
    pub fn save(&self, checkpoint: &ProcessingCheckpoint) -> Result<()> {
        write_json(&self.path(&checkpoint.stage), checkpoint)
    }

    /// Deletes a stage checkpoint.
    pub fn reset(&self, stage: &str) -> Result<()> {
        let path = self.path(stage);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WatershedError::io(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_load_reset() {
        let dir = TempDir::new().unwrap();
        let store = Workspace::new(dir.path()).checkpoints();
        assert!(store.load("fill").unwrap().is_none());

        let mut cp = ProcessingCheckpoint::new("fill", "run-1", 4);
        cp.advance_to(2);
        store.save(&cp).unwrap();
        assert_eq!(store.load("fill").unwrap(), Some(cp));

        store.reset("fill").unwrap();
        store.reset("fill").unwrap();
        assert!(store.load("fill").unwrap().is_none());
    }
}
