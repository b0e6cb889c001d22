//! # Neural Network Module (`nn`)
//!
//! Building blocks for models that take part in the inner loop. Layers hold
//! only their configuration; parameters are looked up by name through the
//! `ParameterResolver` passed to `forward`, which is what lets the inner
//! loop substitute adapted values without the layer noticing.

use crate::maml::{MamlError, ParameterResolver};
use crate::tensor::Tensor;
use std::fmt::Debug;
use std::sync::Arc;

// --- Submodules ---
pub mod functional;
pub mod init;
pub mod loss;
pub mod modules;

// Re-export common items
pub use init::Initializer;
pub use loss::{MseLoss, Reduction};
pub use modules::*;

// --- Core Trait: Module ---

/// Base trait for all neural network modules (layers, containers, etc.).
///
/// `Send + Sync` so one model definition can be shared across the tasks of
/// a parallel meta-batch.
pub trait Module: Debug + Send + Sync + 'static {
    /// Performs the forward pass of the module.
    ///
    /// # Arguments
    /// * `resolver`: Source of every trainable parameter the module reads.
    /// * `input`: The input tensor to the module.
    fn forward(
        &self,
        resolver: &mut dyn ParameterResolver,
        input: &Tensor,
    ) -> Result<Tensor, MamlError>;
}

/// A sequential container for modules.
/// The forward pass applies each module in order.
#[derive(Debug, Default)]
pub struct Sequential {
    modules: Vec<Arc<dyn Module>>,
}

impl Sequential {
    /// Creates a new empty Sequential container.
    pub fn new() -> Self {
        Sequential {
            modules: Vec::new(),
        }
    }

    /// Creates a Sequential container from a vector of modules.
    pub fn from_modules(modules: Vec<Arc<dyn Module>>) -> Self {
        Sequential { modules }
    }

    /// Adds a module to the sequence.
    pub fn add_module(&mut self, module: Arc<dyn Module>) {
        self.modules.push(module);
    }

    /// Builder form of [`Sequential::add_module`].
    pub fn push<M: Module>(mut self, module: M) -> Self {
        self.modules.push(Arc::new(module));
        self
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Module for Sequential {
    fn forward(
        &self,
        resolver: &mut dyn ParameterResolver,
        input: &Tensor,
    ) -> Result<Tensor, MamlError> {
        let mut current = input.clone();
        for module in &self.modules {
            current = module.forward(resolver, &current)?;
        }
        Ok(current)
    }
}
