//! # Parallelism Utilities (CPU Threading)
//!
//! Runs the inner loops of a meta-batch on the rayon thread pool, one
//! orchestrator per task so learning-rate scalars never leak between tasks.

use crate::maml::{
    Hyperparams, InnerLoopOutput, LearningRateRegistry, MamlConfig, MamlError, MamlInnerLoop,
    MamlModel, Mode, ParameterStore,
};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Result of adapting to one task.
#[derive(Debug)]
pub struct TaskAdaptation<O> {
    pub output: InnerLoopOutput<O>,
    /// The task's own learning rates. Leaves when `learn_inner_lr` is set.
    pub learning_rates: LearningRateRegistry,
}

fn run_task<M: MamlModel>(
    config: &MamlConfig,
    store: &mut ParameterStore,
    batches: &[(M::Features, M::Labels)],
    model: &M,
    mode: Mode,
    params: Option<Hyperparams>,
) -> Result<TaskAdaptation<M::Outputs>, MamlError> {
    let mut maml = MamlInnerLoop::new(config.clone())?;
    let output = maml.inner_loop(store, batches, model, mode, params)?;
    Ok(TaskAdaptation {
        output,
        learning_rates: maml.learning_rates().clone(),
    })
}

/// Adapts to every task in `tasks`, returning results in task order.
///
/// The first task runs on the calling thread against `store` itself so
/// every parameter is materialized exactly once. The remaining tasks run in
/// parallel, each on a clone of the warmed store; clones share leaves, so
/// all outputs differentiate back to the same base parameters.
pub fn par_inner_loops<M>(
    config: &MamlConfig,
    store: &mut ParameterStore,
    tasks: &[Vec<(M::Features, M::Labels)>],
    model: &M,
    mode: Mode,
    params: Option<Hyperparams>,
) -> Result<Vec<TaskAdaptation<M::Outputs>>, MamlError>
where
    M: MamlModel + Sync,
    M::Features: Sync,
    M::Labels: Sync,
    M::Outputs: Send,
{
    let Some((first, rest)) = tasks.split_first() else {
        return Ok(Vec::new());
    };
    config.validate()?;

    let warm = run_task(config, store, first, model, mode, params.clone())?;
    let warmed: &ParameterStore = store;
    debug!(tasks = tasks.len(), parameters = warmed.len(), "store warmed, adapting remaining tasks");

    let remaining = rest
        .par_iter()
        .enumerate()
        .map(|(i, batches)| {
            let mut local = warmed.clone();
            let adaptation = run_task(config, &mut local, batches, model, mode, params.clone())?;
            if local.len() != warmed.len() {
                warn!(
                    task = i + 1,
                    created = local.len() - warmed.len(),
                    "task materialized parameters the first task never used; they are not shared"
                );
            }
            Ok(adaptation)
        })
        .collect::<Result<Vec<_>, MamlError>>()?;

    let mut results = Vec::with_capacity(tasks.len());
    results.push(warm);
    results.extend(remaining);
    Ok(results)
}
