//! The explicit handle every stage runs against.
//!
//! A [`PipelineContext`] bundles the workspace, the engine, the validated
//! configuration and the event sink. Stages receive it by reference; there
//! is no ambient "current workspace".

mod identity;

pub use identity::RunIdentity;

use crate::config::PipelineConfig;
use crate::core::{FeatureClass, RegionLayer};
use crate::engine::{GeoEngine, NativeEngine};
use crate::errors::Result;
use crate::events::{EventSink, LoggingEventSink};
use crate::workspace::{read_json, CheckpointStore, Workspace};
use std::fmt;
use std::sync::Arc;

/// Everything a stage needs to run.
#[derive(Clone)]
pub struct PipelineContext {
    identity: RunIdentity,
    workspace: Workspace,
    engine: Arc<dyn GeoEngine>,
    config: Arc<PipelineConfig>,
    events: Arc<dyn EventSink>,
}

impl fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineContext")
            .field("run_id", &self.identity.run_id)
            .field("workspace", &self.workspace.root())
            .finish_non_exhaustive()
    }
}

impl PipelineContext {
    /// Creates a context over the configured workspace root, using the
    /// native engine and a logging event sink.
    ///
    /// The configuration is validated here, before any stage can run.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            identity: RunIdentity::new(),
            workspace: Workspace::new(&config.workspace.root),
            engine: Arc::new(NativeEngine::new()),
            config: Arc::new(config),
            events: Arc::new(LoggingEventSink::default()),
        })
    }

    /// Replaces the engine.
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn GeoEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Replaces the run identity.
    #[must_use]
    pub fn with_identity(mut self, identity: RunIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// The run identity.
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// The workspace.
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// The engine.
    pub fn engine(&self) -> &dyn GeoEngine {
        self.engine.as_ref()
    }

    /// The configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The event sink.
    pub fn events(&self) -> &dyn EventSink {
        self.events.as_ref()
    }

    /// Checkpoint storage.
    pub fn checkpoints(&self) -> CheckpointStore {
        self.workspace.checkpoints()
    }

    /// Loads and validates the quarter-section reference layer.
    pub fn regions(&self) -> Result<RegionLayer> {
        let reference = &self.config.reference;
        let class: FeatureClass = read_json(&self.config.reference_path())?;
        RegionLayer::from_feature_class(&class, &reference.id_field, reference.require_field.as_deref())
    }
}
