//! ModelGate Core Module
//!
//! The core module owns the model lifecycle behind the HTTP API: hyperparameter
//! snapshots, the active model handle, the trainer collaborator that rebuilds
//! it, and the single persisted artifact.

pub mod config;
pub mod model;
pub mod params;
pub mod service;
pub mod store;
pub mod trainer;

// Re-export commonly used types for easier access
pub use config::{AuthSettings, GateConfig, LoggingSettings, ModelSettings, ServerSettings, TokenEntry};
pub use model::{Architecture, ModelError, ModelHandle};
pub use params::{HyperParams, ParamsError, RetrainModelParams};
pub use service::{
    ModelService, Prediction, RetrainStatus, RetrainTicket, ServiceError, TaskRetention,
};
pub use store::{ModelStore, StoreError};
pub use trainer::{RebuildRequest, Trainer, TrainerError, UntrainedRebuild};
