//! # Activation Function Modules

use crate::maml::{MamlError, ParameterResolver};
use crate::nn::functional as F;
use crate::nn::Module;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// Activation applied at the end of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Identity,
    Relu,
    Tanh,
}

impl Activation {
    pub fn apply(self, input: &Tensor) -> Tensor {
        match self {
            Activation::Identity => input.clone(),
            Activation::Relu => F::relu(input),
            Activation::Tanh => F::tanh(input),
        }
    }
}

/// Applies the Rectified Linear Unit function element-wise.
/// `ReLU(x) = max(0, x)`
#[derive(Debug, Clone, Copy, Default)]
pub struct ReLU;

impl ReLU {
    pub fn new() -> Self {
        ReLU
    }
}

impl Module for ReLU {
    fn forward(
        &self,
        _resolver: &mut dyn ParameterResolver,
        input: &Tensor,
    ) -> Result<Tensor, MamlError> {
        Ok(F::relu(input))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Tanh;

impl Tanh {
    pub fn new() -> Self {
        Tanh
    }
}

impl Module for Tanh {
    fn forward(
        &self,
        _resolver: &mut dyn ParameterResolver,
        input: &Tensor,
    ) -> Result<Tensor, MamlError> {
        Ok(F::tanh(input))
    }
}
