//! # Neural Network Layer Modules
//!
//! Layers that read their parameters through a `ParameterResolver`.

pub mod linear;
pub use linear::Dense;

pub mod activation;
pub use activation::{Activation, ReLU, Tanh};
