//! Model service
//!
//! Owns the active model handle and the last-recorded hyperparameters as two
//! atomically swapped immutable snapshots. Predict reads whichever handle is
//! active at call time without locking; retrain records the new parameters
//! synchronously and rebuilds the model on a tracked background task.

use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::model::{ModelError, ModelHandle};
use crate::params::{HyperParams, ParamsError};
use crate::store::{ModelStore, StoreError};
use crate::trainer::{RebuildRequest, Trainer, TrainerError};

/// Model service errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("failed to load model: {0}")]
    ModelLoad(#[source] StoreError),

    #[error("invalid hyperparameters: {0}")]
    InvalidParams(#[from] ParamsError),

    #[error(transparent)]
    Inference(#[from] ModelError),

    #[error("trainer error: {0}")]
    Trainer(#[from] TrainerError),

    #[error("failed to persist model: {0}")]
    Persist(#[from] StoreError),

    #[error("background task failed: {0}")]
    Background(String),

    #[error("service is shutting down")]
    ShuttingDown,
}

/// Lifecycle of a submitted retrain
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RetrainStatus {
    Pending,
    Running,
    Completed { model_id: Uuid, trained: bool },
    Failed { error: String },
}

impl RetrainStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            RetrainStatus::Completed { .. } | RetrainStatus::Failed { .. }
        )
    }
}

/// Synchronous answer to a retrain submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrainTicket {
    pub task_id: Uuid,
    pub params: HyperParams,
}

/// Inference result plus the parameters recorded at call time.
///
/// `params` may be newer than the model that produced `prediction` while a
/// rebuild is still in flight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub prediction: Vec<Vec<f32>>,
    pub params: HyperParams,
}

/// How long finished retrain statuses stay queryable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRetention {
    /// Finished entries older than this are evicted
    pub ttl: Duration,
    /// Upper bound on finished entries; the oldest are evicted first
    pub max_finished: usize,
}

impl Default for TaskRetention {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_finished: 1024,
        }
    }
}

struct TaskEntry {
    status: RetrainStatus,
    /// Completion time and order, set once the status is finished
    finished: Option<(Instant, u64)>,
}

struct Inner {
    store: ModelStore,
    trainer: Arc<dyn Trainer>,
    dataset: Option<PathBuf>,
    model: ArcSwap<ModelHandle>,
    params: ArcSwap<HyperParams>,
    tasks: DashMap<Uuid, TaskEntry>,
    retention: TaskRetention,
    finished_seq: AtomicU64,
    /// Serializes persist-and-swap so memory and disk agree after each task
    publish: Mutex<()>,
    tracker: TaskTracker,
    /// Held for reading across check-and-spawn, for writing by shutdown
    accepting: RwLock<bool>,
}

/// Shared handle to the model service
#[derive(Clone)]
pub struct ModelService {
    inner: Arc<Inner>,
}

impl ModelService {
    /// Load the default artifact and start serving it.
    ///
    /// Fails if the artifact is missing, corrupt or inconsistent.
    pub async fn start(
        store: ModelStore,
        trainer: Arc<dyn Trainer>,
        dataset: Option<PathBuf>,
        retention: TaskRetention,
    ) -> Result<Self, ServiceError> {
        let loader = store.clone();
        let model = tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| ServiceError::Background(e.to_string()))?
            .map_err(ServiceError::ModelLoad)?;

        info!(
            model_id = %model.id,
            input_width = model.input_width(),
            trained = model.trained,
            path = %store.path().display(),
            "Loaded default model"
        );

        Ok(Self::from_model(model, store, trainer, dataset, retention))
    }

    /// Serve an already-loaded handle
    pub fn from_model(
        model: ModelHandle,
        store: ModelStore,
        trainer: Arc<dyn Trainer>,
        dataset: Option<PathBuf>,
        retention: TaskRetention,
    ) -> Self {
        let params = model.hyperparams;
        Self {
            inner: Arc::new(Inner {
                store,
                trainer,
                dataset,
                model: ArcSwap::from_pointee(model),
                params: ArcSwap::from_pointee(params),
                tasks: DashMap::new(),
                retention,
                finished_seq: AtomicU64::new(0),
                publish: Mutex::new(()),
                tracker: TaskTracker::new(),
                accepting: RwLock::new(true),
            }),
        }
    }

    /// Record `params` and schedule a background rebuild.
    ///
    /// Returns as soon as the task is queued; the rebuild's outcome is only
    /// visible through [`ModelService::retrain_status`].
    pub fn retrain(&self, params: HyperParams) -> Result<RetrainTicket, ServiceError> {
        params.validate()?;

        let accepting = self.inner.accepting();
        if !*accepting {
            return Err(ServiceError::ShuttingDown);
        }

        self.inner.params.store(Arc::new(params));

        self.inner.prune_tasks();
        let task_id = Uuid::new_v4();
        self.inner.set_status(task_id, RetrainStatus::Pending);

        let inner = Arc::clone(&self.inner);
        self.inner
            .tracker
            .spawn(async move { inner.run_retrain(task_id, params).await });
        drop(accepting);

        info!(
            task_id = %task_id,
            learning_rate = params.learning_rate,
            dropout = params.dropout,
            regularization = params.regularization,
            "Model update triggered"
        );

        Ok(RetrainTicket { task_id, params })
    }

    pub fn retrain_status(&self, task_id: Uuid) -> Option<RetrainStatus> {
        self.inner
            .tasks
            .get(&task_id)
            .map(|entry| entry.value().status.clone())
    }

    /// Run inference against the handle active at call time
    pub fn predict(&self, features: &[f64]) -> Result<Prediction, ServiceError> {
        let model = self.inner.model.load_full();
        let params = **self.inner.params.load();

        let prediction = model.predict(features)?;
        debug!(model_id = %model.id, features = features.len(), "Prediction served");

        Ok(Prediction { prediction, params })
    }

    pub fn current_model(&self) -> Arc<ModelHandle> {
        self.inner.model.load_full()
    }

    pub fn current_params(&self) -> HyperParams {
        **self.inner.params.load()
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.inner.store.path().to_path_buf()
    }

    /// Wait for every retrain scheduled so far to finish
    pub async fn wait_idle(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        let accepting = self.inner.accepting();
        if *accepting {
            self.inner.tracker.reopen();
        }
    }

    /// Stop accepting retrains and wait up to `timeout` for in-flight ones.
    ///
    /// Never fails; a timeout is logged and the remaining tasks are abandoned.
    pub async fn shutdown(&self, timeout: Duration) {
        {
            let mut accepting = self
                .inner
                .accepting
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *accepting = false;
            self.inner.tracker.close();
        }

        let in_flight = self.inner.tracker.len();
        if in_flight > 0 {
            info!(in_flight, "Waiting for background retrains to finish");
        }

        match tokio::time::timeout(timeout, self.inner.tracker.wait()).await {
            Ok(()) => info!("Model service stopped"),
            Err(_) => warn!(
                remaining = self.inner.tracker.len(),
                "Timed out waiting for background retrains; abandoning them"
            ),
        }
    }
}

impl Inner {
    fn accepting(&self) -> std::sync::RwLockReadGuard<'_, bool> {
        self.accepting
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_status(&self, task_id: Uuid, status: RetrainStatus) {
        let finished = status
            .is_finished()
            .then(|| (Instant::now(), self.finished_seq.fetch_add(1, Ordering::Relaxed)));
        self.tasks.insert(task_id, TaskEntry { status, finished });
    }

    /// Evict finished statuses past the TTL, then the oldest beyond the cap
    fn prune_tasks(&self) {
        let ttl = self.retention.ttl;
        self.tasks.retain(|_, entry| match entry.finished {
            Some((at, _)) => at.elapsed() < ttl,
            None => true,
        });

        let mut finished: Vec<(u64, Uuid)> = self
            .tasks
            .iter()
            .filter_map(|entry| entry.value().finished.map(|(_, seq)| (seq, *entry.key())))
            .collect();
        if finished.len() <= self.retention.max_finished {
            return;
        }

        finished.sort_unstable();
        let excess = finished.len() - self.retention.max_finished;
        for (_, task_id) in finished.into_iter().take(excess) {
            self.tasks.remove(&task_id);
        }
        debug!(evicted = excess, "Evicted finished retrain statuses");
    }

    async fn run_retrain(&self, task_id: Uuid, params: HyperParams) {
        self.set_status(task_id, RetrainStatus::Running);
        debug!(task_id = %task_id, trainer = self.trainer.name(), "Retrain started");

        match self.rebuild_and_publish(params).await {
            Ok(model) => {
                info!(
                    task_id = %task_id,
                    model_id = %model.id,
                    trained = model.trained,
                    "Retrain completed"
                );
                self.set_status(
                    task_id,
                    RetrainStatus::Completed {
                        model_id: model.id,
                        trained: model.trained,
                    },
                );
            }
            Err(e) => {
                error!(task_id = %task_id, error = %e, "Retrain failed");
                self.set_status(
                    task_id,
                    RetrainStatus::Failed {
                        error: e.to_string(),
                    },
                );
            }
        }
        self.prune_tasks();
    }

    async fn rebuild_and_publish(
        &self,
        params: HyperParams,
    ) -> Result<Arc<ModelHandle>, ServiceError> {
        let request = RebuildRequest {
            params,
            input_width: self.model.load().input_width(),
            dataset: self.dataset.clone(),
        };

        let model = self.trainer.rebuild(request).await?;
        model.check_consistency()?;

        self.publish(model).await
    }

    async fn publish(&self, model: ModelHandle) -> Result<Arc<ModelHandle>, ServiceError> {
        let _guard = self.publish.lock().await;

        let model = Arc::new(model);

        let store = self.store.clone();
        let saved = Arc::clone(&model);
        tokio::task::spawn_blocking(move || store.save(&saved))
            .await
            .map_err(|e| ServiceError::Background(e.to_string()))??;

        self.model.store(Arc::clone(&model));
        Ok(model)
    }
}
