//! Hyperparameter snapshots
//!
//! A `HyperParams` value is taken once per retrain request and never mutated
//! afterwards; the service swaps whole snapshots in and out.

use serde::{Deserialize, Serialize};

pub const DEFAULT_LEARNING_RATE: f64 = 0.001;
pub const DEFAULT_DROPOUT: f64 = 0.3;
pub const DEFAULT_REGULARIZATION: f64 = 0.001;

/// Bound violation on a hyperparameter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("{field} = {value} is out of range (expected {expected})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
}

/// Tunable settings used when a model is rebuilt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HyperParams {
    /// Optimizer step size, strictly positive
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Dropout rate between the hidden and output layer, in [0, 1]
    #[serde(default = "default_dropout")]
    pub dropout: f64,
    /// L2 penalty on the hidden kernel, non-negative
    #[serde(default = "default_regularization")]
    pub regularization: f64,
}

fn default_learning_rate() -> f64 {
    DEFAULT_LEARNING_RATE
}

fn default_dropout() -> f64 {
    DEFAULT_DROPOUT
}

fn default_regularization() -> f64 {
    DEFAULT_REGULARIZATION
}

impl Default for HyperParams {
    fn default() -> Self {
        Self {
            learning_rate: DEFAULT_LEARNING_RATE,
            dropout: DEFAULT_DROPOUT,
            regularization: DEFAULT_REGULARIZATION,
        }
    }
}

impl HyperParams {
    /// Check every field against its bound, reporting the first violation
    pub fn validate(&self) -> Result<(), ParamsError> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ParamsError::OutOfRange {
                field: "learning_rate",
                value: self.learning_rate,
                expected: "> 0",
            });
        }

        if !self.dropout.is_finite() || !(0.0..=1.0).contains(&self.dropout) {
            return Err(ParamsError::OutOfRange {
                field: "dropout",
                value: self.dropout,
                expected: "within [0, 1]",
            });
        }

        if !self.regularization.is_finite() || self.regularization < 0.0 {
            return Err(ParamsError::OutOfRange {
                field: "regularization",
                value: self.regularization,
                expected: ">= 0",
            });
        }

        Ok(())
    }
}

/// Body of the legacy `/model/re-train` route
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrainModelParams {
    pub learning_rate: f64,
    pub dropout: f64,
}

impl RetrainModelParams {
    /// Fill in the regularization strength this route does not carry
    pub fn with_regularization(self, regularization: f64) -> HyperParams {
        HyperParams {
            learning_rate: self.learning_rate,
            dropout: self.dropout,
            regularization,
        }
    }
}
