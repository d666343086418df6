//! Model handles
//!
//! A `ModelHandle` is an immutable, fully constructed feed-forward regressor:
//! `Dense(hidden, relu, L2) -> Dropout -> Dense(output)`. Handles are never
//! mutated once built; a retrain produces a new handle that replaces the old
//! one wholesale.

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::params::HyperParams;

/// Width of the hidden dense layer
pub const DEFAULT_HIDDEN_UNITS: usize = 64;
/// Width of the output layer (single regression target)
pub const DEFAULT_OUTPUT_WIDTH: usize = 1;

/// Errors raised by model construction and inference
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("expected {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("feature at index {index} is not a finite 32-bit float")]
    InvalidFeature { index: usize },

    #[error("inconsistent model: {0}")]
    Inconsistent(String),
}

/// Layer sizes of the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Architecture {
    pub input_width: usize,
    pub hidden_units: usize,
    pub output_width: usize,
}

impl Architecture {
    /// The architecture rebuilt on every retrain
    pub fn sequential(input_width: usize) -> Self {
        Self {
            input_width,
            hidden_units: DEFAULT_HIDDEN_UNITS,
            output_width: DEFAULT_OUTPUT_WIDTH,
        }
    }
}

/// Optimizer and loss recorded when the model is compiled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileSettings {
    pub optimizer: String,
    pub learning_rate: f64,
    pub loss: String,
}

impl CompileSettings {
    fn adam_mse(learning_rate: f64) -> Self {
        Self {
            optimizer: "adam".to_string(),
            learning_rate,
            loss: "mse".to_string(),
        }
    }
}

/// Learned parameters of both dense layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    /// Hidden kernel, `input_width x hidden_units`
    pub hidden_kernel: Array2<f32>,
    pub hidden_bias: Array1<f32>,
    /// Output kernel, `hidden_units x output_width`
    pub output_kernel: Array2<f32>,
    pub output_bias: Array1<f32>,
}

/// Opaque reference to a trained (or freshly compiled) inference artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelHandle {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub architecture: Architecture,
    pub compile: CompileSettings,
    pub hyperparams: HyperParams,
    /// Whether any fit step ran on this handle
    pub trained: bool,
    pub weights: Weights,
}

impl ModelHandle {
    /// Build and compile a new model without fitting it.
    ///
    /// Kernels use Glorot-uniform initialization and biases start at zero.
    /// Passing a seed makes the weights reproducible.
    pub fn build(
        architecture: Architecture,
        hyperparams: HyperParams,
        seed: Option<u64>,
    ) -> Result<Self, ModelError> {
        if architecture.input_width == 0
            || architecture.hidden_units == 0
            || architecture.output_width == 0
        {
            return Err(ModelError::Inconsistent(format!(
                "layer sizes must be positive: {:?}",
                architecture
            )));
        }

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let weights = Weights {
            hidden_kernel: glorot_uniform(
                &mut rng,
                architecture.input_width,
                architecture.hidden_units,
            ),
            hidden_bias: Array1::zeros(architecture.hidden_units),
            output_kernel: glorot_uniform(
                &mut rng,
                architecture.hidden_units,
                architecture.output_width,
            ),
            output_bias: Array1::zeros(architecture.output_width),
        };

        Ok(Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            architecture,
            compile: CompileSettings::adam_mse(hyperparams.learning_rate),
            hyperparams,
            trained: false,
            weights,
        })
    }

    pub fn input_width(&self) -> usize {
        self.architecture.input_width
    }

    pub fn output_width(&self) -> usize {
        self.architecture.output_width
    }

    /// Verify that every weight tensor agrees with the declared architecture
    pub fn check_consistency(&self) -> Result<(), ModelError> {
        let arch = self.architecture;
        let w = &self.weights;

        if arch.input_width == 0 || arch.hidden_units == 0 || arch.output_width == 0 {
            return Err(ModelError::Inconsistent(
                "layer sizes must be positive".to_string(),
            ));
        }
        if w.hidden_kernel.dim() != (arch.input_width, arch.hidden_units) {
            return Err(ModelError::Inconsistent(format!(
                "hidden kernel is {:?}, architecture expects {:?}",
                w.hidden_kernel.dim(),
                (arch.input_width, arch.hidden_units)
            )));
        }
        if w.hidden_bias.len() != arch.hidden_units {
            return Err(ModelError::Inconsistent(format!(
                "hidden bias has {} entries, architecture expects {}",
                w.hidden_bias.len(),
                arch.hidden_units
            )));
        }
        if w.output_kernel.dim() != (arch.hidden_units, arch.output_width) {
            return Err(ModelError::Inconsistent(format!(
                "output kernel is {:?}, architecture expects {:?}",
                w.output_kernel.dim(),
                (arch.hidden_units, arch.output_width)
            )));
        }
        if w.output_bias.len() != arch.output_width {
            return Err(ModelError::Inconsistent(format!(
                "output bias has {} entries, architecture expects {}",
                w.output_bias.len(),
                arch.output_width
            )));
        }

        let all_finite = w
            .hidden_kernel
            .iter()
            .chain(w.hidden_bias.iter())
            .chain(w.output_kernel.iter())
            .chain(w.output_bias.iter())
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(ModelError::Inconsistent(
                "weights contain non-finite values".to_string(),
            ));
        }

        Ok(())
    }

    /// Run inference on one feature row.
    ///
    /// Returns a `1 x output_width` matrix. Dropout is inactive at inference.
    pub fn predict(&self, features: &[f64]) -> Result<Vec<Vec<f32>>, ModelError> {
        if features.len() != self.architecture.input_width {
            return Err(ModelError::ShapeMismatch {
                expected: self.architecture.input_width,
                actual: features.len(),
            });
        }
        // Finite f64 values beyond the f32 range would become infinite below
        if let Some(index) = features.iter().position(|&v| !(v as f32).is_finite()) {
            return Err(ModelError::InvalidFeature { index });
        }

        let row: Array1<f32> = features.iter().map(|&v| v as f32).collect();
        let input = row.insert_axis(Axis(0));

        let hidden = (input.dot(&self.weights.hidden_kernel) + &self.weights.hidden_bias)
            .mapv(|v| v.max(0.0));
        let output = hidden.dot(&self.weights.output_kernel) + &self.weights.output_bias;

        Ok(output.outer_iter().map(|r| r.to_vec()).collect())
    }
}

fn glorot_uniform(rng: &mut StdRng, fan_in: usize, fan_out: usize) -> Array2<f32> {
    let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
    Array2::from_shape_simple_fn((fan_in, fan_out), || rng.gen_range(-limit..=limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(input_width: usize) -> ModelHandle {
        ModelHandle::build(
            Architecture::sequential(input_width),
            HyperParams::default(),
            Some(7),
        )
        .unwrap()
    }

    #[test]
    fn test_compile_produces_consistent_untrained_model() {
        let model = handle(4);
        assert!(model.check_consistency().is_ok());
        assert!(!model.trained);
        assert_eq!(model.weights.hidden_kernel.dim(), (4, DEFAULT_HIDDEN_UNITS));
        assert_eq!(model.weights.output_kernel.dim(), (DEFAULT_HIDDEN_UNITS, 1));
        assert_eq!(model.compile.optimizer, "adam");
        assert_eq!(model.compile.loss, "mse");
        assert!(model.weights.hidden_bias.iter().all(|b| *b == 0.0));
    }

    #[test]
    fn test_glorot_limit_respected() {
        let model = handle(10);
        let limit = (6.0f32 / (10 + DEFAULT_HIDDEN_UNITS) as f32).sqrt();
        assert!(model
            .weights
            .hidden_kernel
            .iter()
            .all(|w| w.abs() <= limit));
    }

    #[test]
    fn test_seed_makes_weights_reproducible() {
        let a = handle(3);
        let b = handle(3);
        assert_eq!(a.weights, b.weights);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_zero_width_is_rejected() {
        let result = ModelHandle::build(Architecture::sequential(0), HyperParams::default(), None);
        assert!(matches!(result, Err(ModelError::Inconsistent(_))));
    }

    #[test]
    fn test_predict_returns_single_row() {
        let model = handle(3);
        let prediction = model.predict(&[0.5, -1.0, 2.0]).unwrap();
        assert_eq!(prediction.len(), 1);
        assert_eq!(prediction[0].len(), DEFAULT_OUTPUT_WIDTH);
        assert!(prediction[0][0].is_finite());
    }

    #[test]
    fn test_predict_is_deterministic() {
        let model = handle(3);
        let first = model.predict(&[1.0, 2.0, 3.0]).unwrap();
        let second = model.predict(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_predict_shape_mismatch() {
        let model = handle(3);
        assert_eq!(
            model.predict(&[1.0, 2.0]),
            Err(ModelError::ShapeMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(
            model.predict(&[]),
            Err(ModelError::ShapeMismatch {
                expected: 3,
                actual: 0
            })
        );
    }

    #[test]
    fn test_predict_rejects_non_finite_feature() {
        let model = handle(2);
        assert_eq!(
            model.predict(&[1.0, f64::INFINITY]),
            Err(ModelError::InvalidFeature { index: 1 })
        );
    }

    #[test]
    fn test_predict_rejects_feature_outside_f32_range() {
        let model = handle(2);
        assert_eq!(
            model.predict(&[1e300, 1.0]),
            Err(ModelError::InvalidFeature { index: 0 })
        );
        assert_eq!(
            model.predict(&[1.0, -1e39]),
            Err(ModelError::InvalidFeature { index: 1 })
        );
        assert!(model.predict(&[1e30, 1.0]).is_ok());
    }

    #[test]
    fn test_zero_weights_give_zero_output() {
        let mut model = handle(2);
        model.weights.hidden_kernel.fill(0.0);
        model.weights.output_bias.fill(0.25);
        let prediction = model.predict(&[3.0, 4.0]).unwrap();
        assert_eq!(prediction, vec![vec![0.25]]);
    }

    #[test]
    fn test_relu_forward_pass() {
        let mut model = ModelHandle::build(
            Architecture {
                input_width: 2,
                hidden_units: 2,
                output_width: 1,
            },
            HyperParams::default(),
            Some(1),
        )
        .unwrap();
        model.weights.hidden_kernel = ndarray::array![[1.0, -1.0], [1.0, -1.0]];
        model.weights.hidden_bias = ndarray::array![0.0, 0.0];
        model.weights.output_kernel = ndarray::array![[2.0], [5.0]];
        model.weights.output_bias = ndarray::array![1.0];

        // hidden = relu([3, -3]) = [3, 0]; output = 3 * 2 + 0 * 5 + 1
        let prediction = model.predict(&[1.0, 2.0]).unwrap();
        assert_eq!(prediction, vec![vec![7.0]]);
    }

    #[test]
    fn test_consistency_detects_mixed_architectures() {
        let mut model = handle(3);
        let other = handle(5);
        model.weights.hidden_kernel = other.weights.hidden_kernel;
        assert!(matches!(
            model.check_consistency(),
            Err(ModelError::Inconsistent(_))
        ));
    }
}
