//! # Tensor Module
//!
//! This module defines the core `Tensor` struct and related functionalities,
//! including storage, operations, and automatic differentiation.
//!
//! Every tensor carries a graph node. Nodes get a process-unique id from a
//! monotonically increasing counter, so an op's output always has a larger
//! id than any of its inputs. The backward pass relies on that ordering.

use ndarray::{ArrayD, IxDyn};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLockReadGuard, RwLockWriteGuard};

// --- Submodules ---
pub mod autograd;
pub mod ops;
pub mod storage;

// --- Re-exports ---
pub use autograd::{gradients, BackwardOp, GradFn};
pub use storage::CpuStorage;

// --- Error Handling ---
#[derive(thiserror::Error, Debug)]
pub enum TensorError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
    #[error("Incompatible shapes for operation {op}: {shape1:?} and {shape2:?}")]
    IncompatibleShapes {
        op: String,
        shape1: Vec<usize>,
        shape2: Vec<usize>,
    },
    #[error("Expected a scalar tensor, got shape {shape:?}")]
    NotScalar { shape: Vec<usize> },
    #[error("Operation requires gradient but tensor does not have it")]
    RequiresGradNotSet,
    #[error("ndarray error: {0}")]
    NdarrayError(#[from] ndarray::ShapeError),
    #[error("Autograd error: {0}")]
    AutogradError(String),
    #[error("Generic error: {0}")]
    Generic(String),
}

/// Element type of every tensor in the crate.
pub type TensorData = f32;

static NEXT_NODE_ID: AtomicUsize = AtomicUsize::new(0);

fn next_node_id() -> usize {
    NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Graph node shared by all clones of a tensor.
pub(crate) struct Node {
    id: usize,
    grad_fn: Option<GradFn>,
    /// Accumulated gradient, only populated on leaves by `Tensor::backward`.
    grad: Mutex<Option<ArrayD<TensorData>>>,
}

impl Node {
    fn leaf() -> Self {
        Node {
            id: next_node_id(),
            grad_fn: None,
            grad: Mutex::new(None),
        }
    }

    fn with_grad_fn(grad_fn: GradFn) -> Self {
        Node {
            id: next_node_id(),
            grad_fn: Some(grad_fn),
            grad: Mutex::new(None),
        }
    }
}

/// # Tensor
///
/// The core data structure for numerical computation, similar to PyTorch's Tensor.
/// It wraps an `ndarray::ArrayD` for storage and includes metadata for autograd.
///
/// Cloning is cheap: the clone shares both the storage and the graph node,
/// so it is the *same* value as far as `autograd::gradients` is concerned.
#[derive(Clone)]
pub struct Tensor {
    storage: CpuStorage,
    shape: Vec<usize>,
    node: Arc<Node>,
    requires_grad: bool,
}

impl Tensor {
    /// Creates a new leaf Tensor from an ndarray::ArrayD.
    pub fn new(data: ArrayD<TensorData>, requires_grad: bool) -> Self {
        let shape = data.shape().to_vec();
        Tensor {
            storage: CpuStorage::new(data),
            shape,
            node: Arc::new(Node::leaf()),
            requires_grad,
        }
    }

    /// Creates a 0-dimensional tensor holding `value`.
    pub fn scalar(value: TensorData, requires_grad: bool) -> Self {
        Tensor::new(ArrayD::from_elem(IxDyn(&[]), value), requires_grad)
    }

    /// Creates a leaf tensor from a flat row-major vector.
    pub fn from_vec(
        shape: &[usize],
        values: Vec<TensorData>,
        requires_grad: bool,
    ) -> Result<Self, TensorError> {
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)?;
        Ok(Tensor::new(data, requires_grad))
    }

    /// Creates a Tensor that is not a leaf node (i.e., result of an operation).
    pub(crate) fn from_op(data: ArrayD<TensorData>, grad_fn: GradFn) -> Self {
        let shape = data.shape().to_vec();
        Tensor {
            storage: CpuStorage::new(data),
            shape,
            node: Arc::new(Node::with_grad_fn(grad_fn)),
            requires_grad: true,
        }
    }

    /// Returns the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Returns the total number of elements.
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    /// Checks if the tensor represents a single scalar value.
    pub fn is_scalar(&self) -> bool {
        self.size() == 1
    }

    /// Unique id of the graph node behind this tensor.
    pub fn id(&self) -> usize {
        self.node.id
    }

    /// True when `other` is this very value (a clone), not merely equal data.
    pub fn same_node(&self, other: &Tensor) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Is this a leaf node in the computation graph?
    pub fn is_leaf(&self) -> bool {
        self.node.grad_fn.is_none()
    }

    pub(crate) fn grad_fn(&self) -> Option<&GradFn> {
        self.node.grad_fn.as_ref()
    }

    /// Provides read-only access to the underlying data.
    /// Note: This locks the RwLock for reading.
    pub fn data(&self) -> RwLockReadGuard<'_, ArrayD<TensorData>> {
        self.storage.read_lock()
    }

    /// Provides mutable access to the underlying data.
    /// Writes are invisible to autograd; only meant for leaves (e.g. an
    /// outer-loop update of a parameter or learned learning rate).
    pub fn data_mut(&self) -> RwLockWriteGuard<'_, ArrayD<TensorData>> {
        self.storage.write_lock()
    }

    /// Clones the underlying data into a new ArrayD.
    pub fn data_clone(&self) -> ArrayD<TensorData> {
        self.data().clone()
    }

    /// Flat row-major copy of the values.
    pub fn to_vec(&self) -> Vec<TensorData> {
        self.data().iter().copied().collect()
    }

    /// Value of a single-element tensor.
    pub fn item(&self) -> Result<TensorData, TensorError> {
        if !self.is_scalar() {
            return Err(TensorError::NotScalar {
                shape: self.shape.clone(),
            });
        }
        self.data()
            .iter()
            .next()
            .copied()
            .ok_or_else(|| TensorError::NotScalar {
                shape: self.shape.clone(),
            })
    }

    /// Detaches the tensor from the computation graph.
    /// Returns a new tensor sharing the same data but without autograd history.
    pub fn detach(&self) -> Self {
        Tensor {
            storage: self.storage.clone(),
            shape: self.shape.clone(),
            node: Arc::new(Node::leaf()),
            requires_grad: false,
        }
    }

    /// Retrieves the accumulated gradient of a leaf, if any.
    pub fn grad(&self) -> Option<Tensor> {
        let grad = self.node.grad.lock().expect("Gradient Mutex poisoned");
        grad.as_ref().map(|g| Tensor::new(g.clone(), false))
    }

    /// Clears the accumulated gradient.
    pub fn zero_grad(&self) {
        *self.node.grad.lock().expect("Gradient Mutex poisoned") = None;
    }

    pub(crate) fn accumulate_grad(&self, incoming: &Tensor) -> Result<(), TensorError> {
        if self.shape() != incoming.shape() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.clone(),
                got: incoming.shape().to_vec(),
            });
        }
        let mut grad = self.node.grad.lock().expect("Gradient Mutex poisoned");
        let incoming_data = incoming.data();
        match grad.as_mut() {
            Some(existing) => *existing += &*incoming_data,
            None => *grad = Some(incoming_data.clone()),
        }
        Ok(())
    }

    /// Initiates the backward pass from this (scalar) tensor and accumulates
    /// gradients into every reachable leaf that requires grad.
    pub fn backward(&self) -> Result<(), TensorError> {
        if !self.requires_grad {
            return Err(TensorError::RequiresGradNotSet);
        }
        if !self.is_scalar() {
            return Err(TensorError::NotScalar {
                shape: self.shape.clone(),
            });
        }

        let leaves = autograd::reachable_leaves(self);
        let grads = autograd::gradients(self, &leaves, false)?;
        for (leaf, grad) in leaves.iter().zip(grads) {
            if let Some(grad) = grad {
                leaf.accumulate_grad(&grad)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("id", &self.node.id)
            .field("shape", &self.shape)
            .field("requires_grad", &self.requires_grad)
            .field("is_leaf", &self.is_leaf())
            .field("data", &*self.data())
            .finish()
    }
}

// --- Operator Overloading ---
use std::ops::{Add, Mul, Neg, Sub};

impl Add<&Tensor> for &Tensor {
    type Output = Result<Tensor, TensorError>;

    fn add(self, other: &Tensor) -> Self::Output {
        ops::add(self, other)
    }
}

impl Sub<&Tensor> for &Tensor {
    type Output = Result<Tensor, TensorError>;

    fn sub(self, other: &Tensor) -> Self::Output {
        ops::sub(self, other)
    }
}

// Element-wise multiplication
impl Mul<&Tensor> for &Tensor {
    type Output = Result<Tensor, TensorError>;

    fn mul(self, other: &Tensor) -> Self::Output {
        ops::mul(self, other)
    }
}

impl Neg for &Tensor {
    type Output = Tensor;

    fn neg(self) -> Tensor {
        ops::neg(self)
    }
}

// --- Helper functions ---

/// Helper to create a tensor filled with zeros.
pub fn zeros(shape: &[usize], requires_grad: bool) -> Tensor {
    Tensor::new(ArrayD::zeros(IxDyn(shape)), requires_grad)
}

/// Helper to create a tensor filled with ones.
pub fn ones(shape: &[usize], requires_grad: bool) -> Tensor {
    Tensor::new(ArrayD::ones(IxDyn(shape)), requires_grad)
}

/// Helper to create a tensor filled with `value`.
pub fn full(shape: &[usize], value: TensorData, requires_grad: bool) -> Tensor {
    Tensor::new(ArrayD::from_elem(IxDyn(shape), value), requires_grad)
}
