//! # Model-Agnostic Meta-Learning Inner Loop (`maml`)
//!
//! Per-task adaptation of a model's parameters by a few steps of gradient
//! descent, kept differentiable (or selectively not) so an outer loop can
//! optimize the initial parameters through the adaptation.
//!
//! The pieces, bottom up:
//! * [`ParameterStore`] owns the base parameters (trainable leaves).
//! * [`Generation`] is an immutable snapshot of the parameters after `k`
//!   inner steps.
//! * [`ParameterResolver`] is what model code reads parameters through;
//!   [`VariableInterceptor`] serves them from a generation and falls back
//!   to the store.
//! * [`InnerStepEngine`] turns a loss and a generation into the next
//!   generation, with rates from a [`LearningRateRegistry`].
//! * [`MamlInnerLoop`] drives a [`MamlModel`] through all of it.

pub mod config;
pub mod error;
pub mod generation;
pub mod inner_loop;
pub mod learning_rate;
pub mod loss;
pub mod resolver;
pub mod step;
pub mod store;

pub use config::{MamlConfig, UnconditionedSource};
pub use error::MamlError;
pub use generation::{Generation, Parameter, ParameterOrigin};
pub use inner_loop::{Hyperparams, InnerLoopOutput, MamlInnerLoop, MamlModel, Mode, Phase};
pub use learning_rate::{LearningRateRegistry, LearningRateReport};
pub use loss::{extract_train_loss, TrainOutput};
pub use resolver::{ParameterResolver, ReuseOnlyResolver, StoreReuseResolver, VariableInterceptor};
pub use step::{Autodiff, GradientProvider, InnerStepEngine};
pub use store::ParameterStore;
