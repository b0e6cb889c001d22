//! # Cache Generations
//!
//! A generation is the complete parameter set as it stood after a given
//! number of inner steps. Outside the crate it is read-only; inside, it is
//! only ever extended (a name is written at most once per generation).

use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a parameter value in a generation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterOrigin {
    /// Read from the backing store (fresh or reused leaf).
    Materialized,
    /// Produced by the gradient step that created generation `step`.
    Adapted { step: usize },
}

#[derive(Debug, Clone)]
pub struct Parameter {
    value: Tensor,
    origin: ParameterOrigin,
}

impl Parameter {
    pub fn materialized(value: Tensor) -> Self {
        Parameter {
            value,
            origin: ParameterOrigin::Materialized,
        }
    }

    pub fn adapted(value: Tensor, step: usize) -> Self {
        Parameter {
            value,
            origin: ParameterOrigin::Adapted { step },
        }
    }

    pub fn value(&self) -> &Tensor {
        &self.value
    }

    pub fn origin(&self) -> ParameterOrigin {
        self.origin
    }
}

/// Insertion-ordered snapshot `{name -> parameter}` after `step` inner steps.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    step: usize,
    entries: Vec<(String, Parameter)>,
    index: HashMap<String, usize>,
}

impl Generation {
    /// Generation 0, empty until the first forward pass populates it.
    pub fn initial() -> Self {
        Generation::default()
    }

    /// Empty generation that will hold the result of the next step.
    pub(crate) fn successor(&self) -> Self {
        Generation {
            step: self.step + 1,
            entries: Vec::with_capacity(self.entries.len()),
            index: HashMap::with_capacity(self.entries.len()),
        }
    }

    /// Number of inner steps between the initial parameters and this generation.
    pub fn step(&self) -> usize {
        self.step
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.parameter(name).map(Parameter::value)
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    /// Parameters in the order they were first resolved.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.entries.iter().map(|(name, p)| (name.as_str(), p))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Adds `name` unless it is already present. Returns whether it was added.
    pub(crate) fn insert(&mut self, name: &str, parameter: Parameter) -> bool {
        if self.index.contains_key(name) {
            return false;
        }
        self.index.insert(name.to_string(), self.entries.len());
        self.entries.push((name.to_string(), parameter));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::full;

    #[test]
    fn keeps_first_resolution_order() {
        let mut generation = Generation::initial();
        assert!(generation.insert("b", Parameter::materialized(full(&[1], 1.0, true))));
        assert!(generation.insert("a", Parameter::materialized(full(&[1], 2.0, true))));

        assert_eq!(generation.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(generation.get("a").unwrap().to_vec(), vec![2.0]);
    }

    #[test]
    fn names_are_written_once() {
        let mut generation = Generation::initial();
        let first = full(&[1], 1.0, true);
        generation.insert("w", Parameter::materialized(first.clone()));
        assert!(!generation.insert("w", Parameter::materialized(full(&[1], 5.0, true))));

        assert_eq!(generation.len(), 1);
        assert!(generation.get("w").unwrap().same_node(&first));
    }

    #[test]
    fn successor_starts_empty_one_step_later() {
        let mut generation = Generation::initial();
        generation.insert("w", Parameter::materialized(full(&[1], 1.0, true)));
        let next = generation.successor();
        assert_eq!(next.step(), 1);
        assert!(next.is_empty());
    }
}
