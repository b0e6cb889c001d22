//! # Automatic Differentiation (Autograd)
//!
//! Implements the reverse-mode automatic differentiation engine.
//!
//! Ops record a [`GradFn`] on their output whenever an input requires grad.
//! [`gradients`] walks that graph from an output back to any set of
//! tensors and returns one optional gradient per requested tensor. Every
//! `BackwardOp` is written in terms of differentiable ops, so with
//! `create_graph = true` the gradients themselves carry history and can be
//! differentiated again (second-order MAML relies on this).

use super::{ops, Tensor, TensorError};
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;

// --- Backward Operation Trait ---

/// Trait defining the backward pass for an operation.
/// Each operation (like Add, Mul, ReLU) has a struct implementing this.
pub trait BackwardOp: Debug + Send + Sync + 'static {
    /// Computes the gradients with respect to the inputs of the operation.
    ///
    /// # Arguments
    /// * `inputs` - The input tensors of the original forward operation.
    /// * `output_grad` - The gradient flowing back into this operation's output tensor.
    ///
    /// # Returns
    /// One gradient per input, in the same order as `inputs`, each with the
    /// shape of its input.
    fn backward(&self, inputs: &[Tensor], output_grad: &Tensor) -> Result<Vec<Tensor>, TensorError>;
}

/// Backward function recorded on a non-leaf tensor.
#[derive(Debug)]
pub struct GradFn {
    op: Box<dyn BackwardOp>,
    inputs: Vec<Tensor>,
}

impl GradFn {
    pub fn new(op: Box<dyn BackwardOp>, inputs: Vec<Tensor>) -> Self {
        GradFn { op, inputs }
    }

    pub fn inputs(&self) -> &[Tensor] {
        &self.inputs
    }
}

// --- Graph Traversal ---

/// Collects every tensor that requires grad and is reachable from `root`,
/// ordered so that each tensor comes before all of its inputs.
fn reverse_topological(root: &Tensor) -> Vec<Tensor> {
    let mut seen: HashSet<usize> = HashSet::new();
    let mut stack = vec![root.clone()];
    let mut order = Vec::new();

    while let Some(tensor) = stack.pop() {
        if !tensor.requires_grad() || !seen.insert(tensor.id()) {
            continue;
        }
        if let Some(grad_fn) = tensor.grad_fn() {
            stack.extend(grad_fn.inputs.iter().cloned());
        }
        order.push(tensor);
    }

    // Ids grow with creation order, so descending id is a valid reverse
    // topological order.
    order.sort_by(|a, b| b.id().cmp(&a.id()));
    order
}

/// Leaves reachable from `root` that require grad.
pub(crate) fn reachable_leaves(root: &Tensor) -> Vec<Tensor> {
    reverse_topological(root)
        .into_iter()
        .filter(Tensor::is_leaf)
        .collect()
}

// --- Main Gradient Function ---

/// Computes `d output / d input` for every tensor in `inputs`.
///
/// # Arguments
/// * `output`: The tensor to differentiate; seeded with ones of its own shape.
/// * `inputs`: Any tensors from the graph (leaves or intermediates).
/// * `create_graph`: Keep the returned gradients differentiable.
///
/// # Returns
/// A vector of the same length as `inputs`. An entry is `None` when that
/// input does not influence `output`.
pub fn gradients(
    output: &Tensor,
    inputs: &[Tensor],
    create_graph: bool,
) -> Result<Vec<Option<Tensor>>, TensorError> {
    if !output.requires_grad() {
        return Ok(vec![None; inputs.len()]);
    }

    let mut grads: HashMap<usize, Tensor> = HashMap::new();
    grads.insert(output.id(), super::ones(output.shape(), false));

    for tensor in reverse_topological(output) {
        let Some(grad_fn) = tensor.grad_fn() else {
            continue;
        };
        let Some(output_grad) = grads.get(&tensor.id()).cloned() else {
            continue;
        };

        let input_grads = grad_fn.op.backward(&grad_fn.inputs, &output_grad)?;
        if input_grads.len() != grad_fn.inputs.len() {
            return Err(TensorError::AutogradError(format!(
                "Backward op {:?} produced {} gradients, but expected {}",
                grad_fn.op,
                input_grads.len(),
                grad_fn.inputs.len()
            )));
        }

        for (input, grad) in grad_fn.inputs.iter().zip(input_grads) {
            if !input.requires_grad() {
                continue;
            }
            if grad.shape() != input.shape() {
                return Err(TensorError::AutogradError(format!(
                    "Backward op {:?} produced gradient of shape {:?} for input of shape {:?}",
                    grad_fn.op,
                    grad.shape(),
                    input.shape()
                )));
            }
            let grad = if create_graph { grad } else { grad.detach() };
            let accumulated = match grads.remove(&input.id()) {
                Some(existing) => ops::add(&existing, &grad)?,
                None => grad,
            };
            grads.insert(input.id(), accumulated);
        }
    }

    Ok(inputs.iter().map(|t| grads.get(&t.id()).cloned()).collect())
}

// --- Concrete BackwardOp Implementations ---

pub mod op_abstractions {
    use super::*;

    // ---- Add ----
    #[derive(Debug)]
    pub struct AddBackward;
    impl BackwardOp for AddBackward {
        fn backward(&self, inputs: &[Tensor], output_grad: &Tensor) -> Result<Vec<Tensor>, TensorError> {
            Ok(vec![
                ops::sum_to(output_grad, inputs[0].shape())?,
                ops::sum_to(output_grad, inputs[1].shape())?,
            ])
        }
    }

    // ---- Sub ----
    #[derive(Debug)]
    pub struct SubBackward;
    impl BackwardOp for SubBackward {
        fn backward(&self, inputs: &[Tensor], output_grad: &Tensor) -> Result<Vec<Tensor>, TensorError> {
            Ok(vec![
                ops::sum_to(output_grad, inputs[0].shape())?,
                ops::neg(&ops::sum_to(output_grad, inputs[1].shape())?),
            ])
        }
    }

    // ---- Mul ----
    #[derive(Debug)]
    pub struct MulBackward;
    impl BackwardOp for MulBackward {
        fn backward(&self, inputs: &[Tensor], output_grad: &Tensor) -> Result<Vec<Tensor>, TensorError> {
            let (a, b) = (&inputs[0], &inputs[1]);
            Ok(vec![
                ops::sum_to(&ops::mul(output_grad, b)?, a.shape())?,
                ops::sum_to(&ops::mul(output_grad, a)?, b.shape())?,
            ])
        }
    }

    // ---- Neg ----
    #[derive(Debug)]
    pub struct NegBackward;
    impl BackwardOp for NegBackward {
        fn backward(&self, _inputs: &[Tensor], output_grad: &Tensor) -> Result<Vec<Tensor>, TensorError> {
            Ok(vec![ops::neg(output_grad)])
        }
    }

    // ---- AddScalar ----
    #[derive(Debug)]
    pub struct AddScalarBackward;
    impl BackwardOp for AddScalarBackward {
        fn backward(&self, _inputs: &[Tensor], output_grad: &Tensor) -> Result<Vec<Tensor>, TensorError> {
            Ok(vec![output_grad.clone()])
        }
    }

    // ---- MulScalar ----
    #[derive(Debug)]
    pub struct MulScalarBackward {
        scalar: f32,
    }
    impl MulScalarBackward {
        pub fn new(scalar: f32) -> Self {
            Self { scalar }
        }
    }
    impl BackwardOp for MulScalarBackward {
        fn backward(&self, _inputs: &[Tensor], output_grad: &Tensor) -> Result<Vec<Tensor>, TensorError> {
            Ok(vec![ops::mul_scalar(output_grad, self.scalar)])
        }
    }

    // ---- MatMul ----
    // C = A @ B  =>  dA = dC @ B^T,  dB = A^T @ dC
    #[derive(Debug)]
    pub struct MatMulBackward;
    impl BackwardOp for MatMulBackward {
        fn backward(&self, inputs: &[Tensor], output_grad: &Tensor) -> Result<Vec<Tensor>, TensorError> {
            let (a, b) = (&inputs[0], &inputs[1]);
            Ok(vec![
                ops::matmul(output_grad, &ops::transpose(b)?)?,
                ops::matmul(&ops::transpose(a)?, output_grad)?,
            ])
        }
    }

    // ---- Transpose ----
    #[derive(Debug)]
    pub struct TransposeBackward;
    impl BackwardOp for TransposeBackward {
        fn backward(&self, _inputs: &[Tensor], output_grad: &Tensor) -> Result<Vec<Tensor>, TensorError> {
            Ok(vec![ops::transpose(output_grad)?])
        }
    }

    // ---- Sum ----
    #[derive(Debug)]
    pub struct SumBackward {
        input_shape: Vec<usize>,
    }
    impl SumBackward {
        pub fn new(input_shape: Vec<usize>) -> Self {
            Self { input_shape }
        }
    }
    impl BackwardOp for SumBackward {
        fn backward(&self, _inputs: &[Tensor], output_grad: &Tensor) -> Result<Vec<Tensor>, TensorError> {
            Ok(vec![ops::broadcast_to(output_grad, &self.input_shape)?])
        }
    }

    // ---- BroadcastTo ----
    #[derive(Debug)]
    pub struct BroadcastBackward {
        input_shape: Vec<usize>,
    }
    impl BroadcastBackward {
        pub fn new(input_shape: Vec<usize>) -> Self {
            Self { input_shape }
        }
    }
    impl BackwardOp for BroadcastBackward {
        fn backward(&self, _inputs: &[Tensor], output_grad: &Tensor) -> Result<Vec<Tensor>, TensorError> {
            Ok(vec![ops::sum_to(output_grad, &self.input_shape)?])
        }
    }

    // ---- SumTo ----
    #[derive(Debug)]
    pub struct SumToBackward {
        input_shape: Vec<usize>,
    }
    impl SumToBackward {
        pub fn new(input_shape: Vec<usize>) -> Self {
            Self { input_shape }
        }
    }
    impl BackwardOp for SumToBackward {
        fn backward(&self, _inputs: &[Tensor], output_grad: &Tensor) -> Result<Vec<Tensor>, TensorError> {
            Ok(vec![ops::broadcast_to(output_grad, &self.input_shape)?])
        }
    }

    // ---- ReLU ----
    #[derive(Debug)]
    pub struct ReluBackward;
    impl BackwardOp for ReluBackward {
        fn backward(&self, inputs: &[Tensor], output_grad: &Tensor) -> Result<Vec<Tensor>, TensorError> {
            // Grad Input = dOutput * (Input > 0 ? 1 : 0); the mask is a constant.
            let mask = inputs[0].data().mapv(|x| if x > 0.0 { 1.0 } else { 0.0 });
            Ok(vec![ops::mul(output_grad, &Tensor::new(mask, false))?])
        }
    }

    // ---- Tanh ----
    #[derive(Debug)]
    pub struct TanhBackward;
    impl BackwardOp for TanhBackward {
        fn backward(&self, inputs: &[Tensor], output_grad: &Tensor) -> Result<Vec<Tensor>, TensorError> {
            // grad_input = grad_output * (1 - tanh(input)^2)
            let t = ops::tanh(&inputs[0]);
            let one_minus_t2 = ops::add_scalar(&ops::neg(&ops::square(&t)), 1.0);
            Ok(vec![ops::mul(output_grad, &one_minus_t2)?])
        }
    }
}

pub use op_abstractions::*;
