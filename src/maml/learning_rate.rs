//! # Inner-Loop Learning Rates
//!
//! One scalar per adapted parameter name, created on first use and kept for
//! the lifetime of the registry. When learned, these scalars are leaves the
//! outer loop can differentiate with respect to.

use crate::tensor::{Tensor, TensorData, TensorError};
use std::collections::BTreeMap;
use tracing::debug;

/// Snapshot of the current learning-rate values for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub enum LearningRateReport {
    /// Fixed rate shared by every parameter.
    Shared(TensorData),
    /// Learned rate per adapted parameter name.
    PerParameter(BTreeMap<String, TensorData>),
}

#[derive(Debug, Clone)]
pub struct LearningRateRegistry {
    base: TensorData,
    trainable: bool,
    entries: BTreeMap<String, Tensor>,
}

impl LearningRateRegistry {
    pub fn new(base: TensorData, trainable: bool) -> Self {
        LearningRateRegistry {
            base,
            trainable,
            entries: BTreeMap::new(),
        }
    }

    /// Name under which the learning rate for `parameter` is reported.
    pub fn variable_name(parameter: &str) -> String {
        format!("inner_learning_rates/{}_inner_lr", parameter.replace('/', "_"))
    }

    /// The scalar for `name`, created at the base rate on first request.
    /// Repeated calls return the same tensor.
    pub fn get_or_create(&mut self, name: &str) -> Tensor {
        if let Some(lr) = self.entries.get(name) {
            return lr.clone();
        }
        let lr = Tensor::scalar(self.base, self.trainable);
        debug!(
            parameter = name,
            variable = %Self::variable_name(name),
            value = self.base,
            trainable = self.trainable,
            "created inner learning rate"
        );
        self.entries.insert(name.to_string(), lr.clone());
        lr
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.entries.get(name)
    }

    pub fn base(&self) -> TensorData {
        self.base
    }

    pub fn is_trainable(&self) -> bool {
        self.trainable
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.entries.iter().map(|(name, lr)| (name.as_str(), lr))
    }

    /// Learning-rate leaves, for handing to the outer optimizer.
    pub fn trainable_parameters(&self) -> Vec<Tensor> {
        if !self.trainable {
            return Vec::new();
        }
        self.entries.values().cloned().collect()
    }

    /// Fails with `NotScalar` if an entry is no longer a scalar.
    pub fn report(&self) -> Result<LearningRateReport, TensorError> {
        if !self.trainable {
            return Ok(LearningRateReport::Shared(self.base));
        }
        let values = self
            .entries
            .iter()
            .map(|(name, lr)| Ok((name.clone(), lr.item()?)))
            .collect::<Result<BTreeMap<_, _>, TensorError>>()?;
        Ok(LearningRateReport::PerParameter(values))
    }

    /// `(tag, value)` pairs for an external summary writer.
    pub fn parameter_summaries(&self) -> Result<Vec<(String, TensorData)>, TensorError> {
        let summaries = match self.report()? {
            LearningRateReport::Shared(value) => {
                vec![("inner_loop_learning_rate".to_string(), value)]
            }
            LearningRateReport::PerParameter(values) => values
                .into_iter()
                .map(|(name, value)| (format!("inner_loop_learning_rates/{}", name), value))
                .collect(),
        };
        for (tag, value) in &summaries {
            debug!(tag = %tag, value, "learning rate summary");
        }
        Ok(summaries)
    }
}
