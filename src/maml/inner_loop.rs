//! # Inner-Loop Orchestration
//!
//! Runs the adaptation steps of one task and the evaluation passes on its
//! held-out batch:
//!
//! `Init -> AdaptStep(0..n) -> ConvergenceCheck -> ConditionedEval -> UnconditionedEval -> Done`

use super::config::{MamlConfig, UnconditionedSource};
use super::generation::Generation;
use super::learning_rate::{LearningRateRegistry, LearningRateReport};
use super::loss::{extract_train_loss, TrainOutput};
use super::resolver::{
    ParameterResolver, ReuseOnlyResolver, StoreReuseResolver, VariableInterceptor,
};
use super::step::{Autodiff, GradientProvider, InnerStepEngine};
use super::store::ParameterStore;
use super::MamlError;
use crate::tensor::{Tensor, TensorData};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, debug_span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Train,
    Eval,
    Predict,
}

/// Free-form model hyperparameters plus the inner-loop flag the
/// orchestrator toggles between passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hyperparams {
    pub is_inner_loop: bool,
    #[serde(default)]
    pub values: BTreeMap<String, serde_json::Value>,
}

impl Hyperparams {
    pub fn new() -> Self {
        Hyperparams::default()
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    AdaptStep(usize),
    ConvergenceCheck,
    ConditionedEval,
    UnconditionedEval,
    Done,
}

/// Model under adaptation. Implementations must read every trainable
/// parameter through the resolver they are handed.
pub trait MamlModel {
    type Features;
    type Labels;
    type Outputs;
    type Aux;

    fn build_inference(
        &self,
        features: &Self::Features,
        labels: &Self::Labels,
        mode: Mode,
        params: &Hyperparams,
        resolver: &mut dyn ParameterResolver,
    ) -> Result<Self::Outputs, MamlError>;

    fn build_train(
        &self,
        features: &Self::Features,
        labels: &Self::Labels,
        outputs: &Self::Outputs,
        mode: Mode,
        config: &MamlConfig,
        params: &Hyperparams,
    ) -> Result<TrainOutput<Self::Aux>, MamlError>;
}

#[derive(Debug, Clone)]
pub struct InnerLoopOutput<O> {
    /// `[unconditioned, conditioned]`, both on the validation batch.
    pub outputs: [O; 2],
    /// Outputs of every adaptation pass plus the convergence check.
    pub inner_outputs: Vec<O>,
    /// Losses matching `inner_outputs` one to one.
    pub inner_losses: Vec<Tensor>,
    /// Every generation used, in order. The last one is the adapted set.
    pub generations: Vec<Generation>,
    pub phases: Vec<Phase>,
}

impl<O> InnerLoopOutput<O> {
    pub fn unconditioned(&self) -> &O {
        &self.outputs[0]
    }

    pub fn conditioned(&self) -> &O {
        &self.outputs[1]
    }

    pub fn adapted(&self) -> Option<&Generation> {
        self.generations.last()
    }

    /// Number of gradient steps taken.
    pub fn steps(&self) -> usize {
        self.adapted().map_or(0, Generation::step)
    }
}

/// Orchestrator for one task stream. Learning-rate scalars live as long as
/// the orchestrator; use a fresh one per task when they must not be shared.
#[derive(Debug, Clone)]
pub struct MamlInnerLoop<G = Autodiff> {
    config: MamlConfig,
    engine: InnerStepEngine<G>,
    learning_rates: LearningRateRegistry,
}

impl MamlInnerLoop<Autodiff> {
    pub fn new(config: MamlConfig) -> Result<Self, MamlError> {
        MamlInnerLoop::with_provider(config, Autodiff)
    }
}

impl<G: GradientProvider> MamlInnerLoop<G> {
    pub fn with_provider(config: MamlConfig, provider: G) -> Result<Self, MamlError> {
        config.validate()?;
        let engine = InnerStepEngine::with_provider(
            config.use_second_order,
            config.var_scope.clone(),
            provider,
        );
        let learning_rates = LearningRateRegistry::new(config.learning_rate, config.learn_inner_lr);
        Ok(MamlInnerLoop {
            config,
            engine,
            learning_rates,
        })
    }

    pub fn config(&self) -> &MamlConfig {
        &self.config
    }

    pub fn learning_rates(&self) -> &LearningRateRegistry {
        &self.learning_rates
    }

    pub fn learning_rate_report(&self) -> Result<LearningRateReport, MamlError> {
        Ok(self.learning_rates.report()?)
    }

    pub fn parameter_summaries(&self) -> Result<Vec<(String, TensorData)>, MamlError> {
        Ok(self.learning_rates.parameter_summaries()?)
    }

    /// A single inner step outside of [`MamlInnerLoop::inner_loop`].
    pub fn compute_and_apply_gradients(
        &mut self,
        loss: &Tensor,
        current: &Generation,
    ) -> Result<Generation, MamlError> {
        self.engine
            .compute_and_apply_gradients(loss, current, &mut self.learning_rates)
    }

    /// Adapts on `batches[..n-1]` and evaluates on `batches[n-1]`.
    ///
    /// Takes one gradient step per adaptation batch, then re-runs the last
    /// adaptation batch on the adapted parameters to observe convergence.
    /// The conditioned pass runs with `is_inner_loop = false`; the
    /// unconditioned pass runs with `is_inner_loop = true` in reuse-only
    /// mode against the source picked by `unconditioned_source`.
    ///
    /// # Errors
    /// `NotEnoughBatches` when fewer than two batches are given. Any
    /// collaborator error aborts the call.
    pub fn inner_loop<M: MamlModel>(
        &mut self,
        store: &mut ParameterStore,
        batches: &[(M::Features, M::Labels)],
        model: &M,
        mode: Mode,
        params: Option<Hyperparams>,
    ) -> Result<InnerLoopOutput<M::Outputs>, MamlError> {
        let span = debug_span!("maml_inner_loop", batches = batches.len(), ?mode);
        let _enter = span.enter();

        let Some(((val_features, val_labels), adaptation)) = batches.split_last() else {
            return Err(MamlError::NotEnoughBatches { got: 0 });
        };
        let Some((last_features, last_labels)) = adaptation.last() else {
            return Err(MamlError::NotEnoughBatches { got: batches.len() });
        };

        let mut params = params.unwrap_or_default();
        params.is_inner_loop = true;

        let mut phases = vec![Phase::Init];
        let mut generations = Vec::with_capacity(adaptation.len() + 1);
        let mut inner_outputs = Vec::with_capacity(adaptation.len() + 1);
        let mut inner_losses = Vec::with_capacity(adaptation.len() + 1);
        let mut current = Generation::initial();
        debug!(steps = adaptation.len(), "inner loop started");

        for (k, (features, labels)) in adaptation.iter().enumerate() {
            phases.push(Phase::AdaptStep(k));
            let (outputs, populated) = self.forward(store, current, model, features, labels, mode, &params)?;
            let loss = self.train_loss(model, features, labels, &outputs, mode, &params)?;
            debug!(step = k, loss = ?loss.item().ok(), parameters = populated.len(), "adaptation pass");

            current = self.engine.compute_and_apply_gradients(
                &loss,
                &populated,
                &mut self.learning_rates,
            )?;
            generations.push(populated);
            inner_outputs.push(outputs);
            inner_losses.push(loss);
        }

        phases.push(Phase::ConvergenceCheck);
        let (outputs, populated) =
            self.forward(store, current, model, last_features, last_labels, mode, &params)?;
        let loss = self.train_loss(model, last_features, last_labels, &outputs, mode, &params)?;
        debug!(loss = ?loss.item().ok(), "convergence check");
        inner_outputs.push(outputs);
        inner_losses.push(loss);
        current = populated;

        phases.push(Phase::ConditionedEval);
        params.is_inner_loop = false;
        let (conditioned, populated) =
            self.forward(store, current, model, val_features, val_labels, mode, &params)?;
        current = populated;

        phases.push(Phase::UnconditionedEval);
        params.is_inner_loop = true;
        let unconditioned = match self.config.unconditioned_source {
            UnconditionedSource::AdaptedCache => {
                let mut resolver = ReuseOnlyResolver::new(&current);
                model.build_inference(val_features, val_labels, mode, &params, &mut resolver)?
            }
            UnconditionedSource::BaseParameters => {
                let mut resolver = StoreReuseResolver::new(store);
                model.build_inference(val_features, val_labels, mode, &params, &mut resolver)?
            }
        };

        phases.push(Phase::Done);
        debug!(
            steps = current.step(),
            parameters = current.len(),
            source = ?self.config.unconditioned_source,
            "inner loop finished"
        );
        generations.push(current);

        Ok(InnerLoopOutput {
            outputs: [unconditioned, conditioned],
            inner_outputs,
            inner_losses,
            generations,
            phases,
        })
    }

    /// One forward pass through an interceptor over `cache`. Returns the
    /// outputs and the cache as extended by the pass.
    #[allow(clippy::too_many_arguments)]
    fn forward<M: MamlModel>(
        &self,
        store: &mut ParameterStore,
        cache: Generation,
        model: &M,
        features: &M::Features,
        labels: &M::Labels,
        mode: Mode,
        params: &Hyperparams,
    ) -> Result<(M::Outputs, Generation), MamlError> {
        let mut interceptor = VariableInterceptor::new(cache, store);
        let outputs = model.build_inference(features, labels, mode, params, &mut interceptor)?;
        Ok((outputs, interceptor.into_generation()))
    }

    fn train_loss<M: MamlModel>(
        &self,
        model: &M,
        features: &M::Features,
        labels: &M::Labels,
        outputs: &M::Outputs,
        mode: Mode,
        params: &Hyperparams,
    ) -> Result<Tensor, MamlError> {
        let result = model.build_train(features, labels, outputs, mode, &self.config, params)?;
        extract_train_loss(&result)
    }
}
