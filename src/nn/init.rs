//! # Parameter Initializers
//!
//! Describes how a parameter is materialized the first time a
//! `ParameterResolver` sees its name. Initializers are plain data so the
//! same description can be handed to any resolver; only the store ever
//! runs one.

use crate::tensor::{TensorData, TensorError};
use ndarray::{ArrayD, IxDyn};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Initializer {
    Zeros,
    Constant(TensorData),
    /// Uniform on `[low, high)`. A seed makes the draw reproducible.
    Uniform {
        low: TensorData,
        high: TensorData,
        seed: Option<u64>,
    },
    /// Uniform on `[-1/sqrt(fan_in), 1/sqrt(fan_in))`, the default for
    /// dense weights.
    KaimingUniform { fan_in: usize, seed: Option<u64> },
}

impl Initializer {
    /// Produces the initial values for a parameter of `shape`.
    pub fn initialize(&self, shape: &[usize]) -> Result<ArrayD<TensorData>, TensorError> {
        match *self {
            Initializer::Zeros => Ok(ArrayD::zeros(IxDyn(shape))),
            Initializer::Constant(value) => Ok(ArrayD::from_elem(IxDyn(shape), value)),
            Initializer::Uniform { low, high, seed } => sample_uniform(shape, low, high, seed),
            Initializer::KaimingUniform { fan_in, seed } => {
                if fan_in == 0 {
                    return Err(TensorError::Generic(
                        "KaimingUniform requires fan_in > 0".to_string(),
                    ));
                }
                let bound = (1.0 / fan_in as TensorData).sqrt();
                sample_uniform(shape, -bound, bound, seed)
            }
        }
    }
}

fn sample_uniform(
    shape: &[usize],
    low: TensorData,
    high: TensorData,
    seed: Option<u64>,
) -> Result<ArrayD<TensorData>, TensorError> {
    if !low.is_finite() || !high.is_finite() || low >= high {
        return Err(TensorError::Generic(format!(
            "Uniform initializer needs finite low < high, got [{}, {})",
            low, high
        )));
    }
    let range = Uniform::new(low, high);
    let data = match seed {
        Some(seed) => {
            let mut rng = StdRng::seed_from_u64(seed);
            ArrayD::from_shape_simple_fn(IxDyn(shape), || range.sample(&mut rng))
        }
        None => {
            let mut rng = rand::thread_rng();
            ArrayD::from_shape_simple_fn(IxDyn(shape), || range.sample(&mut rng))
        }
    };
    Ok(data)
}
