//! # Parameter Store
//!
//! The authoritative, outer-loop view of the model parameters: one leaf
//! tensor per name, created lazily on first request and reused afterwards.

use super::resolver::ParameterResolver;
use super::MamlError;
use crate::nn::init::Initializer;
use crate::tensor::{Tensor, TensorError};
use std::collections::HashMap;
use tracing::debug;

/// Create-or-fetch store of trainable leaves.
///
/// Cloning is cheap and the clone shares every leaf (same graph nodes), so
/// gradients computed against a clone land on the original parameters.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    entries: Vec<(String, Tensor)>,
    index: HashMap<String, usize>,
}

impl ParameterStore {
    pub fn new() -> Self {
        ParameterStore::default()
    }

    /// Returns the parameter `name`, materializing it with `initializer`
    /// when it does not exist yet.
    ///
    /// # Errors
    /// `ShapeMismatch` when `name` exists with a different shape.
    pub fn get_or_create(
        &mut self,
        name: &str,
        shape: &[usize],
        initializer: &Initializer,
    ) -> Result<Tensor, MamlError> {
        if let Some(existing) = self.get(name) {
            if existing.shape() != shape {
                return Err(TensorError::ShapeMismatch {
                    expected: existing.shape().to_vec(),
                    got: shape.to_vec(),
                }
                .into());
            }
            return Ok(existing.clone());
        }

        let value = Tensor::new(initializer.initialize(shape)?, true);
        debug!(name, ?shape, ?initializer, "materialized parameter");
        self.index.insert(name.to_string(), self.entries.len());
        self.entries.push((name.to_string(), value.clone()));
        Ok(value)
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parameters in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.entries.iter().map(|(name, t)| (name.as_str(), t))
    }

    /// Clones of every leaf, e.g. for an outer-loop `gradients` call.
    pub fn parameters(&self) -> Vec<Tensor> {
        self.entries.iter().map(|(_, t)| t.clone()).collect()
    }
}

/// Plain forward passes outside the inner loop read the store directly.
impl ParameterResolver for ParameterStore {
    fn resolve(
        &mut self,
        name: &str,
        shape: &[usize],
        initializer: &Initializer,
    ) -> Result<Tensor, MamlError> {
        self.get_or_create(name, shape, initializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_once_then_reuses() {
        let mut store = ParameterStore::new();
        let first = store
            .get_or_create("dense/weight", &[2, 3], &Initializer::Constant(0.5))
            .unwrap();
        let second = store
            .get_or_create("dense/weight", &[2, 3], &Initializer::Zeros)
            .unwrap();

        assert!(first.same_node(&second));
        assert!(first.requires_grad());
        assert!(first.is_leaf());
        assert_eq!(second.to_vec(), vec![0.5; 6]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn shape_conflicts_are_errors() {
        let mut store = ParameterStore::new();
        store.get_or_create("w", &[2], &Initializer::Zeros).unwrap();
        let err = store.get_or_create("w", &[3], &Initializer::Zeros).unwrap_err();
        assert!(matches!(err, MamlError::Tensor(TensorError::ShapeMismatch { .. })));
    }

    #[test]
    fn clones_share_leaves() {
        let mut store = ParameterStore::new();
        store.get_or_create("w", &[1], &Initializer::Constant(1.0)).unwrap();
        let clone = store.clone();
        assert!(clone.get("w").unwrap().same_node(store.get("w").unwrap()));
    }
}
