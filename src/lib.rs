//! # RTorch MAML
//!
//! Model-Agnostic Meta-Learning on top of a small reverse-mode tensor
//! library. The crate provides:
//! * `tensor`: n-dimensional tensors with higher-order autograd.
//! * `nn`: layers that read their parameters through a resolver.
//! * `maml`: parameter interception, inner gradient steps, learning-rate
//!   management and inner-loop orchestration.
//! * `utils`: parallel meta-batches and snapshot serialization.

pub mod maml;
pub mod nn;
pub mod tensor;
pub mod utils;

pub mod prelude {
    pub use crate::maml::{
        extract_train_loss, Generation, Hyperparams, InnerLoopOutput, MamlConfig, MamlError,
        MamlInnerLoop, MamlModel, Mode, ParameterResolver, ParameterStore, TrainOutput,
    };
    pub use crate::nn::{Activation, Dense, Initializer, Module, Sequential};
    pub use crate::tensor::{gradients, Tensor, TensorError};
}
