//! ModelGate API Module
//!
//! The API module exposes the model service over HTTP: retrain submission,
//! retrain status, and prediction, all behind bearer-token authentication.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod models;
pub mod server;

pub use auth::{AuthContext, AuthError, AuthGate, StaticTokenVerifier, TokenVerifier};
pub use error::ApiError;
pub use handlers::ApiState;
pub use models::*;
pub use server::*;
