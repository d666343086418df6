//! Persisted model artifact
//!
//! Exactly one artifact lives at a fixed path. Saving overwrites it through a
//! temp-file rename, so readers and concurrent writers never see a torn file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::model::{Architecture, ModelError, ModelHandle};
use crate::params::HyperParams;

/// Artifact storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("model artifact not found at {0}")]
    Missing(PathBuf),

    #[error("model artifact at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("model artifact at {path} is inconsistent: {source}")]
    Inconsistent {
        path: PathBuf,
        #[source]
        source: ModelError,
    },

    #[error("model artifact already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reads and writes the single model artifact
#[derive(Debug, Clone)]
pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and verify the artifact
    pub fn load(&self) -> Result<ModelHandle, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::Missing(self.path.clone()))
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let model: ModelHandle =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        model
            .check_consistency()
            .map_err(|source| StoreError::Inconsistent {
                path: self.path.clone(),
                source,
            })?;

        debug!(path = %self.path.display(), model_id = %model.id, "Loaded model artifact");
        Ok(model)
    }

    /// Overwrite the artifact with `model`
    pub fn save(&self, model: &ModelHandle) -> Result<(), StoreError> {
        let dir = self.parent_dir();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let bytes = serde_json::to_vec(model)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        tmp.write_all(&bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|source| StoreError::Io {
                path: tmp.path().to_path_buf(),
                source,
            })?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            source: e.error,
        })?;

        debug!(path = %self.path.display(), model_id = %model.id, "Saved model artifact");
        Ok(())
    }

    /// Write a fresh, untrained default artifact.
    ///
    /// Refuses to replace an existing artifact unless `overwrite` is set.
    pub fn init_default(
        &self,
        input_width: usize,
        params: HyperParams,
        overwrite: bool,
    ) -> Result<ModelHandle, StoreError> {
        if !overwrite && self.path.exists() {
            return Err(StoreError::AlreadyExists(self.path.clone()));
        }

        let model = ModelHandle::build(Architecture::sequential(input_width), params, None)
            .map_err(|source| StoreError::Inconsistent {
                path: self.path.clone(),
                source,
            })?;
        self.save(&model)?;

        info!(
            path = %self.path.display(),
            model_id = %model.id,
            input_width,
            "Wrote default model artifact"
        );
        Ok(model)
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}
