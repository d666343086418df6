//! API Handlers Module
//!
//! This module contains the request handlers for the API system.

use axum::{
    debug_handler,
    extract::{Path, State},
    response::Json,
    Extension,
};
use std::sync::Arc;
use uuid::Uuid;

use modelgate_core::{HyperParams, ModelService, RetrainModelParams};

use crate::auth::AuthContext;
use crate::error::{ApiError, Result};
use crate::models::{
    HealthResponse, PredictRequest, PredictResponse, RetrainStatusResponse, UpdateModelResponse,
    WhoAmIResponse,
};

/// Represents the state of the API server
pub struct ApiState {
    /// Model service
    pub service: ModelService,
}

impl ApiState {
    pub fn new(service: ModelService) -> Self {
        Self { service }
    }
}

/// Health check endpoint
#[debug_handler]
pub async fn health_check(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "modelgate-api".to_string(),
        model_id: state.service.current_model().id,
    })
}

/// Record new hyperparameters and trigger a background rebuild
#[debug_handler]
pub async fn update_model(
    State(state): State<Arc<ApiState>>,
    Json(params): Json<HyperParams>,
) -> Result<Json<UpdateModelResponse>> {
    tracing::debug!(
        "Updating model: lr={}, dropout={}, reg={}",
        params.learning_rate,
        params.dropout,
        params.regularization
    );

    let ticket = state.service.retrain(params)?;
    Ok(Json(ticket.into()))
}

/// Legacy retrain route; regularization is carried over from the current params
#[debug_handler]
pub async fn retrain_model(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<RetrainModelParams>,
) -> Result<Json<UpdateModelResponse>> {
    let regularization = state.service.current_params().regularization;
    tracing::debug!("Re-train requested, keeping regularization {}", regularization);

    let ticket = state
        .service
        .retrain(request.with_regularization(regularization))?;
    Ok(Json(ticket.into()))
}

/// Look up a submitted retrain
#[debug_handler]
pub async fn retrain_status(
    State(state): State<Arc<ApiState>>,
    Path(task_id): Path<String>,
) -> Result<Json<RetrainStatusResponse>> {
    let task_id = Uuid::parse_str(&task_id)
        .map_err(|_| ApiError::BadRequest(format!("'{}' is not a task id", task_id)))?;

    match state.service.retrain_status(task_id) {
        Some(status) => Ok(Json(RetrainStatusResponse { task_id, status })),
        None => Err(ApiError::NotFound(format!("retrain task {}", task_id))),
    }
}

/// Run inference on one feature vector
#[debug_handler]
pub async fn predict(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>> {
    tracing::debug!("Predicting on {} features", request.features.len());

    let prediction = state.service.predict(&request.features)?;
    Ok(Json(prediction.into()))
}

/// Echo the identity attached by the auth middleware
#[debug_handler]
pub async fn whoami(Extension(context): Extension<AuthContext>) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse {
        identity: context.identity,
    })
}

/// Token issuance is owned by an external identity service
#[debug_handler]
pub async fn login() -> Result<Json<()>> {
    Err(ApiError::NotImplemented(
        "Token issuance is handled by the identity service".to_string(),
    ))
}
