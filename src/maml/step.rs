//! # Inner Gradient Step
//!
//! Turns one generation plus a loss into the next generation:
//! `theta' = theta - lr * dL/dtheta` for every adaptable parameter that
//! received a gradient, identity for everything else.

use super::generation::{Generation, Parameter};
use super::learning_rate::LearningRateRegistry;
use super::MamlError;
use crate::tensor::{ops, Tensor, TensorError};
use tracing::{debug, trace};

/// Source of gradients for the inner step.
pub trait GradientProvider: Send + Sync {
    /// One entry per value, `None` when the value does not influence `loss`.
    /// With `create_graph` the returned gradients stay differentiable.
    fn gradients(
        &self,
        loss: &Tensor,
        values: &[Tensor],
        create_graph: bool,
    ) -> Result<Vec<Option<Tensor>>, TensorError>;
}

/// The crate's reverse-mode engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct Autodiff;

impl GradientProvider for Autodiff {
    fn gradients(
        &self,
        loss: &Tensor,
        values: &[Tensor],
        create_graph: bool,
    ) -> Result<Vec<Option<Tensor>>, TensorError> {
        crate::tensor::gradients(loss, values, create_graph)
    }
}

#[derive(Debug, Clone)]
pub struct InnerStepEngine<G = Autodiff> {
    use_second_order: bool,
    var_scope: Option<String>,
    provider: G,
}

impl InnerStepEngine<Autodiff> {
    pub fn new(use_second_order: bool, var_scope: Option<String>) -> Self {
        InnerStepEngine::with_provider(use_second_order, var_scope, Autodiff)
    }
}

impl<G: GradientProvider> InnerStepEngine<G> {
    pub fn with_provider(use_second_order: bool, var_scope: Option<String>, provider: G) -> Self {
        InnerStepEngine {
            use_second_order,
            var_scope,
            provider,
        }
    }

    pub fn use_second_order(&self) -> bool {
        self.use_second_order
    }

    pub fn var_scope(&self) -> Option<&str> {
        self.var_scope.as_deref()
    }

    /// Whether `name` passes the scope filter.
    pub fn is_adaptable(&self, name: &str) -> bool {
        match &self.var_scope {
            Some(prefix) => name.starts_with(prefix.as_str()),
            None => true,
        }
    }

    /// Builds the generation that follows `current` after one step on `loss`.
    ///
    /// # Errors
    /// `Precondition` if `current` is empty: nothing has been resolved, so
    /// there is nothing to differentiate.
    pub fn compute_and_apply_gradients(
        &self,
        loss: &Tensor,
        current: &Generation,
        learning_rates: &mut LearningRateRegistry,
    ) -> Result<Generation, MamlError> {
        if current.is_empty() {
            return Err(MamlError::Precondition(
                "no parameter has been resolved yet; run a forward pass before taking a gradient step"
                    .to_string(),
            ));
        }

        let values: Vec<Tensor> = current.iter().map(|(_, p)| p.value().clone()).collect();
        let grads = self
            .provider
            .gradients(loss, &values, self.use_second_order)?;
        if grads.len() != values.len() {
            return Err(TensorError::AutogradError(format!(
                "gradient provider returned {} gradients for {} values",
                grads.len(),
                values.len()
            ))
            .into());
        }

        let mut next = current.successor();
        let mut updated = 0usize;
        for ((name, parameter), grad) in current.iter().zip(grads) {
            let grad = match grad {
                Some(grad) if self.is_adaptable(name) => grad,
                _ => {
                    trace!(name, "carried forward");
                    next.insert(name, parameter.clone());
                    continue;
                }
            };

            let lr = learning_rates.get_or_create(name);
            let mut scaled = ops::mul(&lr, &grad)?;
            if !self.use_second_order {
                scaled = ops::stop_gradient(&scaled);
            }
            let value = ops::sub(parameter.value(), &scaled)?;
            trace!(name, step = next.step(), "updated");
            next.insert(name, Parameter::adapted(value, next.step()));
            updated += 1;
        }

        debug!(
            step = next.step(),
            updated,
            carried = next.len() - updated,
            second_order = self.use_second_order,
            "inner step applied"
        );
        Ok(next)
    }
}
