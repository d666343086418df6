//! Trainer collaborator
//!
//! The trainer turns a hyperparameter snapshot into a new model handle. The
//! in-repo implementation only rebuilds and compiles the architecture; fitting
//! on data is owned by whoever supplies a real `Trainer`.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::model::{Architecture, ModelError, ModelHandle};
use crate::params::HyperParams;

/// Trainer errors
#[derive(Debug, thiserror::Error)]
pub enum TrainerError {
    #[error("model construction failed: {0}")]
    Build(#[from] ModelError),

    #[error("trainer '{trainer}' failed: {reason}")]
    Failed { trainer: String, reason: String },
}

/// Everything a trainer needs to produce a replacement handle
#[derive(Debug, Clone)]
pub struct RebuildRequest {
    pub params: HyperParams,
    /// Feature width of the model being replaced
    pub input_width: usize,
    /// Optional training data location
    pub dataset: Option<PathBuf>,
}

#[async_trait]
pub trait Trainer: Send + Sync {
    /// Produce a new model handle for the given request
    async fn rebuild(&self, request: RebuildRequest) -> Result<ModelHandle, TrainerError>;

    /// Name used in logs and task status
    fn name(&self) -> &str;
}

/// Rebuilds and compiles the architecture without fitting it.
///
/// Handles produced here have `trained == false` and random weights.
#[derive(Debug, Clone, Default)]
pub struct UntrainedRebuild {
    seed: Option<u64>,
}

impl UntrainedRebuild {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the weight initialization seed
    pub fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }
}

#[async_trait]
impl Trainer for UntrainedRebuild {
    async fn rebuild(&self, request: RebuildRequest) -> Result<ModelHandle, TrainerError> {
        debug!(
            input_width = request.input_width,
            learning_rate = request.params.learning_rate,
            dropout = request.params.dropout,
            regularization = request.params.regularization,
            "Rebuilding sequential model"
        );

        if let Some(dataset) = &request.dataset {
            debug!(dataset = %dataset.display(), "Dataset configured but not read by this trainer");
        }

        let model = ModelHandle::build(
            Architecture::sequential(request.input_width),
            request.params,
            self.seed,
        )?;

        warn!(
            model_id = %model.id,
            "Rebuilt model is compiled but untrained; no fit step runs before it is published"
        );

        Ok(model)
    }

    fn name(&self) -> &str {
        "untrained-rebuild"
    }
}
