//! # Parameter Resolution
//!
//! Model code never owns its parameters. Every layer asks a
//! [`ParameterResolver`] for `(name, shape, initializer)` and uses whatever
//! tensor comes back. Swapping the resolver is how the inner loop feeds a
//! model adapted weights without the model knowing it is being adapted.

use super::generation::{Generation, Parameter};
use super::store::ParameterStore;
use super::MamlError;
use crate::nn::init::Initializer;
use crate::tensor::{Tensor, TensorError};
use tracing::trace;

/// Capability handed to model code for looking up parameters.
pub trait ParameterResolver {
    fn resolve(
        &mut self,
        name: &str,
        shape: &[usize],
        initializer: &Initializer,
    ) -> Result<Tensor, MamlError>;
}

fn check_shape(name: &str, cached: &Tensor, shape: &[usize]) -> Result<(), MamlError> {
    if cached.shape() != shape {
        trace!(name, cached = ?cached.shape(), requested = ?shape, "shape conflict");
        return Err(TensorError::ShapeMismatch {
            expected: cached.shape().to_vec(),
            got: shape.to_vec(),
        }
        .into());
    }
    Ok(())
}

/// Serves parameters from a generation cache, falling through to the
/// backing store on a miss and recording the result in the cache.
///
/// Only parameters that are actually requested enter the cache, so the set
/// of adapted parameters is exactly the set the model uses.
pub struct VariableInterceptor<'a> {
    cache: Generation,
    store: &'a mut ParameterStore,
}

impl<'a> VariableInterceptor<'a> {
    pub fn new(cache: Generation, store: &'a mut ParameterStore) -> Self {
        VariableInterceptor { cache, store }
    }

    pub fn cache(&self) -> &Generation {
        &self.cache
    }

    /// Ends the pass, handing back the (possibly extended) cache.
    pub fn into_generation(self) -> Generation {
        self.cache
    }
}

impl ParameterResolver for VariableInterceptor<'_> {
    fn resolve(
        &mut self,
        name: &str,
        shape: &[usize],
        initializer: &Initializer,
    ) -> Result<Tensor, MamlError> {
        if let Some(cached) = self.cache.get(name) {
            check_shape(name, cached, shape)?;
            trace!(name, step = self.cache.step(), "cache hit");
            return Ok(cached.clone());
        }

        let value = self.store.get_or_create(name, shape, initializer)?;
        trace!(name, step = self.cache.step(), "cache miss, read from store");
        self.cache.insert(name, Parameter::materialized(value.clone()));
        Ok(value)
    }
}

/// Reuse-only view of a generation. Requesting a name that is not cached is
/// an error; nothing is ever created.
pub struct ReuseOnlyResolver<'a> {
    cache: &'a Generation,
}

impl<'a> ReuseOnlyResolver<'a> {
    pub fn new(cache: &'a Generation) -> Self {
        ReuseOnlyResolver { cache }
    }
}

impl ParameterResolver for ReuseOnlyResolver<'_> {
    fn resolve(
        &mut self,
        name: &str,
        shape: &[usize],
        _initializer: &Initializer,
    ) -> Result<Tensor, MamlError> {
        let cached = self
            .cache
            .get(name)
            .ok_or_else(|| MamlError::UnresolvedParameter {
                name: name.to_string(),
            })?;
        check_shape(name, cached, shape)?;
        Ok(cached.clone())
    }
}

/// Reuse-only view of the store itself, i.e. the un-adapted parameters.
pub struct StoreReuseResolver<'a> {
    store: &'a ParameterStore,
}

impl<'a> StoreReuseResolver<'a> {
    pub fn new(store: &'a ParameterStore) -> Self {
        StoreReuseResolver { store }
    }
}

impl ParameterResolver for StoreReuseResolver<'_> {
    fn resolve(
        &mut self,
        name: &str,
        shape: &[usize],
        _initializer: &Initializer,
    ) -> Result<Tensor, MamlError> {
        let value = self
            .store
            .get(name)
            .ok_or_else(|| MamlError::UnresolvedParameter {
                name: name.to_string(),
            })?;
        check_shape(name, value, shape)?;
        Ok(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_materializes_and_caches() {
        let mut store = ParameterStore::new();
        let mut interceptor = VariableInterceptor::new(Generation::initial(), &mut store);

        let first = interceptor
            .resolve("w", &[2], &Initializer::Constant(1.0))
            .unwrap();
        let second = interceptor
            .resolve("w", &[2], &Initializer::Constant(9.0))
            .unwrap();
        assert!(first.same_node(&second));

        let generation = interceptor.into_generation();
        assert_eq!(generation.len(), 1);
        assert!(store.get("w").unwrap().same_node(&first));
    }

    #[test]
    fn hit_never_touches_the_store() {
        let mut store = ParameterStore::new();
        let mut cache = Generation::initial().successor();
        let adapted = Tensor::from_vec(&[1], vec![0.5], true).unwrap();
        cache.insert("w", Parameter::adapted(adapted.clone(), 1));

        let mut interceptor = VariableInterceptor::new(cache, &mut store);
        let resolved = interceptor.resolve("w", &[1], &Initializer::Zeros).unwrap();
        assert!(resolved.same_node(&adapted));
        drop(interceptor);
        assert!(store.is_empty());
    }

    #[test]
    fn cached_shape_conflict_is_an_error() {
        let mut store = ParameterStore::new();
        let mut interceptor = VariableInterceptor::new(Generation::initial(), &mut store);
        interceptor.resolve("w", &[2], &Initializer::Zeros).unwrap();
        assert!(interceptor.resolve("w", &[3], &Initializer::Zeros).is_err());
    }

    #[test]
    fn reuse_only_rejects_unknown_names() {
        let cache = Generation::initial();
        let mut resolver = ReuseOnlyResolver::new(&cache);
        let err = resolver
            .resolve("new/bias", &[1], &Initializer::Zeros)
            .unwrap_err();
        assert!(matches!(err, MamlError::UnresolvedParameter { name } if name == "new/bias"));
    }

    #[test]
    fn store_reuse_reads_base_parameters() {
        let mut store = ParameterStore::new();
        let base = store.get_or_create("w", &[1], &Initializer::Constant(2.0)).unwrap();
        let mut resolver = StoreReuseResolver::new(&store);
        assert!(resolver
            .resolve("w", &[1], &Initializer::Zeros)
            .unwrap()
            .same_node(&base));
        assert!(resolver.resolve("b", &[1], &Initializer::Zeros).is_err());
    }
}
