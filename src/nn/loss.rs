//! # Loss Functions
//!
//! Losses take a prediction and a target, so they do not fit the
//! single-input `Module` trait. They wrap the functional implementations
//! and add a reduction choice.

use crate::nn::functional as F;
use crate::tensor::{ops, Tensor, TensorError};
use serde::{Deserialize, Serialize};

/// Specifies the reduction to apply to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    /// No reduction applied. The loss is returned per element.
    None,
    /// The sum of the output will be divided by the number of elements.
    #[default]
    Mean,
    /// The output will be summed.
    Sum,
}

impl Reduction {
    pub fn apply(self, losses: &Tensor) -> Result<Tensor, TensorError> {
        match self {
            Reduction::None => Ok(losses.clone()),
            Reduction::Mean => ops::mean(losses),
            Reduction::Sum => ops::sum(losses),
        }
    }
}

/// Mean squared error criterion, `(x_i - y_i)^2` reduced per `reduction`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MseLoss {
    reduction: Reduction,
}

impl MseLoss {
    pub fn new(reduction: Reduction) -> Self {
        MseLoss { reduction }
    }

    pub fn forward(&self, input: &Tensor, target: &Tensor) -> Result<Tensor, TensorError> {
        self.reduction.apply(&F::squared_error(input, target)?)
    }
}
