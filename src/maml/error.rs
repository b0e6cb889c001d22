//! # MAML Errors

use crate::tensor::TensorError;

/// Errors raised by the inner loop and its collaborators.
///
/// None of these are transient: they signal a programming or contract
/// error and are surfaced to the caller immediately.
#[derive(thiserror::Error, Debug)]
pub enum MamlError {
    #[error("Precondition failed: {0}")]
    Precondition(String),
    #[error(
        "The train function should return a scalar loss or (scalar loss, aux outputs), got a loss of shape {shape:?}"
    )]
    UnrecognizedTrainResult { shape: Vec<usize> },
    #[error("The inner loop needs at least 2 batches (adaptation + validation), got {got}")]
    NotEnoughBatches { got: usize },
    #[error("Parameter '{name}' was not resolved earlier and cannot be created in reuse-only mode")]
    UnresolvedParameter { name: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Config parse error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Tensor(#[from] TensorError),
}
