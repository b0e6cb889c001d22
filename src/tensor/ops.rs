//! # Tensor Operations
//!
//! Implements mathematical operations for Tensors, including autograd support.
//! Binary elementwise ops follow NumPy broadcasting rules.

use super::autograd::op_abstractions::{
    AddBackward, AddScalarBackward, BroadcastBackward, MatMulBackward, MulBackward,
    MulScalarBackward, NegBackward, ReluBackward, SubBackward, SumBackward, SumToBackward,
    TanhBackward, TransposeBackward,
};
use super::autograd::{BackwardOp, GradFn};
use super::{Tensor, TensorData, TensorError};
use ndarray::{ArrayD, Axis, Ix2, IxDyn, Zip};

// --- Helper Function for Autograd Setup ---

/// Creates a new tensor resulting from an operation, recording the backward
/// function only when some input requires grad.
fn create_op_result(
    result_data: ArrayD<TensorData>,
    inputs: Vec<Tensor>,
    backward_op: Box<dyn BackwardOp>,
) -> Tensor {
    if inputs.iter().any(Tensor::requires_grad) {
        Tensor::from_op(result_data, GradFn::new(backward_op, inputs))
    } else {
        Tensor::new(result_data, false)
    }
}

// --- Broadcasting ---

/// Checks if tensor shapes can be broadcast together following NumPy broadcasting rules
pub fn can_broadcast(shape1: &[usize], shape2: &[usize]) -> bool {
    shape1
        .iter()
        .rev()
        .zip(shape2.iter().rev())
        .all(|(&s1, &s2)| s1 == s2 || s1 == 1 || s2 == 1)
}

/// Determines the output shape after broadcasting two tensors
pub fn broadcast_shapes(shape1: &[usize], shape2: &[usize]) -> Result<Vec<usize>, TensorError> {
    if !can_broadcast(shape1, shape2) {
        return Err(TensorError::IncompatibleShapes {
            op: "broadcast".to_string(),
            shape1: shape1.to_vec(),
            shape2: shape2.to_vec(),
        });
    }

    let max_dims = shape1.len().max(shape2.len());
    let padded1 = pad_shape_left(shape1, max_dims);
    let padded2 = pad_shape_left(shape2, max_dims);
    Ok(padded1
        .iter()
        .zip(&padded2)
        .map(|(&a, &b)| if a == 1 { b } else { a })
        .collect())
}

/// Pads a shape with 1s on the left to match the target length
fn pad_shape_left(shape: &[usize], target_len: usize) -> Vec<usize> {
    let mut padded = vec![1; target_len.saturating_sub(shape.len())];
    padded.extend_from_slice(shape);
    padded
}

/// Applies `f` elementwise over the broadcast of `a` and `b`.
fn broadcast_binary(
    a: &Tensor,
    b: &Tensor,
    op: &str,
    f: fn(TensorData, TensorData) -> TensorData,
) -> Result<ArrayD<TensorData>, TensorError> {
    let incompatible = || TensorError::IncompatibleShapes {
        op: op.to_string(),
        shape1: a.shape().to_vec(),
        shape2: b.shape().to_vec(),
    };
    let out_shape = broadcast_shapes(a.shape(), b.shape()).map_err(|_| incompatible())?;

    // Copy one side first: `a` and `b` may be the same tensor.
    let a_data = a.data_clone();
    let b_data = b.data();
    let a_view = a_data.broadcast(IxDyn(&out_shape)).ok_or_else(incompatible)?;
    let b_view = b_data.broadcast(IxDyn(&out_shape)).ok_or_else(incompatible)?;

    Ok(Zip::from(&a_view).and(&b_view).map_collect(|&x, &y| f(x, y)))
}

/// Reduces `data` to `target` by summing over broadcast dimensions.
fn sum_to_data(data: &ArrayD<TensorData>, target: &[usize]) -> Result<ArrayD<TensorData>, TensorError> {
    let mismatch = || TensorError::ShapeMismatch {
        expected: target.to_vec(),
        got: data.shape().to_vec(),
    };
    let leading = data.ndim().checked_sub(target.len()).ok_or_else(mismatch)?;

    let mut result = data.to_owned();
    for _ in 0..leading {
        result = result.sum_axis(Axis(0));
    }
    for (axis, &dim) in target.iter().enumerate() {
        if dim == 1 && result.shape()[axis] != 1 {
            result = result.sum_axis(Axis(axis)).insert_axis(Axis(axis));
        }
    }

    if result.shape() != target {
        return Err(mismatch());
    }
    Ok(result)
}

/// Broadcasts `a` to `shape`.
pub fn broadcast_to(a: &Tensor, shape: &[usize]) -> Result<Tensor, TensorError> {
    if a.shape() == shape {
        return Ok(a.clone());
    }
    let result_data = a
        .data()
        .broadcast(IxDyn(shape))
        .map(|view| view.to_owned())
        .ok_or_else(|| TensorError::IncompatibleShapes {
            op: "broadcast_to".to_string(),
            shape1: a.shape().to_vec(),
            shape2: shape.to_vec(),
        })?;
    Ok(create_op_result(
        result_data,
        vec![a.clone()],
        Box::new(BroadcastBackward::new(a.shape().to_vec())),
    ))
}

/// Sums `a` down to `shape`; the inverse of `broadcast_to`.
pub fn sum_to(a: &Tensor, shape: &[usize]) -> Result<Tensor, TensorError> {
    if a.shape() == shape {
        return Ok(a.clone());
    }
    let result_data = sum_to_data(&a.data(), shape)?;
    Ok(create_op_result(
        result_data,
        vec![a.clone()],
        Box::new(SumToBackward::new(a.shape().to_vec())),
    ))
}

// --- Arithmetic Operations ---

/// Element-wise addition of two tensors.
pub fn add(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    let result_data = broadcast_binary(a, b, "add", |x, y| x + y)?;
    Ok(create_op_result(result_data, vec![a.clone(), b.clone()], Box::new(AddBackward)))
}

/// Element-wise subtraction of two tensors (a - b).
pub fn sub(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    let result_data = broadcast_binary(a, b, "sub", |x, y| x - y)?;
    Ok(create_op_result(result_data, vec![a.clone(), b.clone()], Box::new(SubBackward)))
}

/// Element-wise multiplication of two tensors.
pub fn mul(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    let result_data = broadcast_binary(a, b, "mul", |x, y| x * y)?;
    Ok(create_op_result(result_data, vec![a.clone(), b.clone()], Box::new(MulBackward)))
}

/// Element-wise square, `a * a`.
pub fn square(a: &Tensor) -> Tensor {
    let result_data = a.data().mapv(|x| x * x);
    create_op_result(result_data, vec![a.clone(), a.clone()], Box::new(MulBackward))
}

pub fn neg(a: &Tensor) -> Tensor {
    let result_data = a.data().mapv(|x| -x);
    create_op_result(result_data, vec![a.clone()], Box::new(NegBackward))
}

/// Add a constant to every element.
pub fn add_scalar(a: &Tensor, scalar: TensorData) -> Tensor {
    let result_data = a.data().mapv(|x| x + scalar);
    create_op_result(result_data, vec![a.clone()], Box::new(AddScalarBackward))
}

/// Multiply a tensor by a constant.
pub fn mul_scalar(a: &Tensor, scalar: TensorData) -> Tensor {
    let result_data = a.data().mapv(|x| x * scalar);
    create_op_result(result_data, vec![a.clone()], Box::new(MulScalarBackward::new(scalar)))
}

// --- Matrix Operations ---

/// Matrix multiplication of two 2-D tensors: `[m, k] @ [k, n] -> [m, n]`.
pub fn matmul(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    if a.ndim() != 2 || b.ndim() != 2 || a.shape()[1] != b.shape()[0] {
        return Err(TensorError::IncompatibleShapes {
            op: "matmul".to_string(),
            shape1: a.shape().to_vec(),
            shape2: b.shape().to_vec(),
        });
    }

    let result_data = {
        let a_data = a.data_clone();
        let b_data = b.data();
        let a_view = a_data.view().into_dimensionality::<Ix2>()?;
        let b_view = b_data.view().into_dimensionality::<Ix2>()?;
        a_view.dot(&b_view).into_dyn()
    };
    Ok(create_op_result(result_data, vec![a.clone(), b.clone()], Box::new(MatMulBackward)))
}

/// Transpose of a 2-D tensor.
pub fn transpose(a: &Tensor) -> Result<Tensor, TensorError> {
    if a.ndim() != 2 {
        return Err(TensorError::IncompatibleShapes {
            op: "transpose".to_string(),
            shape1: a.shape().to_vec(),
            shape2: vec![],
        });
    }
    let result_data = a.data().t().to_owned();
    Ok(create_op_result(result_data, vec![a.clone()], Box::new(TransposeBackward)))
}

// --- Activation Functions ---

/// Rectified Linear Unit (ReLU) activation function.
/// max(0, x) applied element-wise.
pub fn relu(a: &Tensor) -> Tensor {
    let result_data = a.data().mapv(|val| val.max(0.0));
    create_op_result(result_data, vec![a.clone()], Box::new(ReluBackward))
}

pub fn tanh(a: &Tensor) -> Tensor {
    let result_data = a.data().mapv(TensorData::tanh);
    create_op_result(result_data, vec![a.clone()], Box::new(TanhBackward))
}

// --- Reduction Operations ---

/// Sums all elements in the tensor. Returns a 0-dim tensor.
pub fn sum(a: &Tensor) -> Result<Tensor, TensorError> {
    let result_data = ArrayD::from_elem(IxDyn(&[]), a.data().sum());
    Ok(create_op_result(
        result_data,
        vec![a.clone()],
        Box::new(SumBackward::new(a.shape().to_vec())),
    ))
}

/// Mean of all elements. Returns a 0-dim tensor.
pub fn mean(a: &Tensor) -> Result<Tensor, TensorError> {
    if a.size() == 0 {
        return Err(TensorError::NotScalar {
            shape: a.shape().to_vec(),
        });
    }
    Ok(mul_scalar(&sum(a)?, 1.0 / a.size() as TensorData))
}

// --- Graph Control ---

/// Treats `a` as a constant for every later differentiation.
pub fn stop_gradient(a: &Tensor) -> Tensor {
    a.detach()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{full, gradients};

    fn t(shape: &[usize], values: &[f32]) -> Tensor {
        Tensor::from_vec(shape, values.to_vec(), true).unwrap()
    }

    #[test]
    fn broadcast_shapes_follow_numpy() {
        assert_eq!(broadcast_shapes(&[2, 3], &[3]).unwrap(), vec![2, 3]);
        assert_eq!(broadcast_shapes(&[], &[4, 1]).unwrap(), vec![4, 1]);
        assert_eq!(broadcast_shapes(&[4, 1], &[1, 5]).unwrap(), vec![4, 5]);
        assert!(broadcast_shapes(&[2, 3], &[2]).is_err());
    }

    #[test]
    fn scalar_times_matrix() {
        let lr = Tensor::scalar(0.5, false);
        let g = t(&[2, 2], &[1.0, 2.0, 3.0, 4.0]);
        let out = mul(&lr, &g).unwrap();
        assert_eq!(out.shape(), &[2, 2]);
        assert_eq!(out.to_vec(), vec![0.5, 1.0, 1.5, 2.0]);
    }

    #[test]
    fn sub_rejects_incompatible_shapes() {
        let err = sub(&full(&[2, 3], 1.0, false), &full(&[4], 1.0, false)).unwrap_err();
        assert!(matches!(err, TensorError::IncompatibleShapes { ref op, .. } if op == "sub"));
    }

    #[test]
    fn matmul_and_its_gradients() {
        let a = t(&[1, 2], &[1.0, 2.0]);
        let b = t(&[2, 1], &[3.0, 4.0]);
        let c = matmul(&a, &b).unwrap();
        assert_eq!(c.to_vec(), vec![11.0]);

        let grads = gradients(&sum(&c).unwrap(), &[a, b], false).unwrap();
        assert_eq!(grads[0].as_ref().unwrap().to_vec(), vec![3.0, 4.0]);
        assert_eq!(grads[1].as_ref().unwrap().to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn sum_to_keeps_unit_axes() {
        let g = full(&[3, 4], 1.0, false);
        let reduced = sum_to(&g, &[3, 1]).unwrap();
        assert_eq!(reduced.shape(), &[3, 1]);
        assert_eq!(reduced.to_vec(), vec![4.0, 4.0, 4.0]);
        assert_eq!(sum_to(&g, &[]).unwrap().item().unwrap(), 12.0);
    }

    #[test]
    fn mean_and_tanh_relu_values() {
        let x = t(&[4], &[-1.0, 0.0, 1.0, 2.0]);
        assert_eq!(mean(&x).unwrap().item().unwrap(), 0.5);
        assert_eq!(relu(&x).to_vec(), vec![0.0, 0.0, 1.0, 2.0]);

        let grads = gradients(&sum(&tanh(&x)).unwrap(), &[x.clone()], false).unwrap();
        let expected: Vec<f32> = x.to_vec().iter().map(|v| 1.0 - v.tanh().powi(2)).collect();
        for (got, want) in grads[0].as_ref().unwrap().to_vec().iter().zip(expected) {
            approx::assert_abs_diff_eq!(*got, want, epsilon = 1e-6);
        }
    }

    #[test]
    fn constants_do_not_record_history() {
        let a = full(&[2], 1.0, false);
        let b = full(&[2], 2.0, false);
        let c = add(&a, &b).unwrap();
        assert!(c.is_leaf());
        assert!(!c.requires_grad());
    }

    #[test]
    fn stop_gradient_cuts_the_graph() {
        let x = Tensor::scalar(3.0, true);
        let y = mul(&stop_gradient(&x), &x).unwrap();
        let grads = gradients(&y, &[x], false).unwrap();
        assert_eq!(grads[0].as_ref().unwrap().item().unwrap(), 3.0);
    }
}
