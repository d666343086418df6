//! API request and response shapes

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use modelgate_core::{HyperParams, Prediction, RetrainStatus, RetrainTicket};

pub const UPDATE_TRIGGERED: &str = "Model update triggered";

/// Response from `/update-model` and `/model/re-train`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateModelResponse {
    pub message: String,
    pub params: HyperParams,
    /// Identifier to query via `GET /update-model/:task_id`
    pub task_id: Uuid,
}

impl From<RetrainTicket> for UpdateModelResponse {
    fn from(ticket: RetrainTicket) -> Self {
        Self {
            message: UPDATE_TRIGGERED.to_string(),
            params: ticket.params,
            task_id: ticket.task_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub features: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: Vec<Vec<f32>>,
    pub params: HyperParams,
}

impl From<Prediction> for PredictResponse {
    fn from(prediction: Prediction) -> Self {
        Self {
            prediction: prediction.prediction,
            params: prediction.params,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrainStatusResponse {
    pub task_id: Uuid,
    pub status: RetrainStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub model_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhoAmIResponse {
    pub identity: String,
}
