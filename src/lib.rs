//! ModelGate: bearer-authenticated retrain and prediction gateway
//!
//! Wires configuration, logging and the HTTP server around the model service.

pub mod cli;
pub mod logging;
