//! # Neural Network Functional Interface (`nn::functional`)
//!
//! Stateless functions over tensors. Layers in `nn::modules` resolve their
//! parameters and then delegate here.

use crate::tensor::{ops, Tensor, TensorError};

// --- Layers ---

/// `input @ weight + bias` for `input: [n, in]`, `weight: [in, out]`,
/// `bias: [out]`.
pub fn linear(input: &Tensor, weight: &Tensor, bias: Option<&Tensor>) -> Result<Tensor, TensorError> {
    let output = ops::matmul(input, weight)?;
    match bias {
        Some(bias) => ops::add(&output, bias),
        None => Ok(output),
    }
}

// --- Activation Functions ---

/// `relu(x) = max(0, x)`
pub fn relu(input: &Tensor) -> Tensor {
    ops::relu(input)
}

pub fn tanh(input: &Tensor) -> Tensor {
    ops::tanh(input)
}

// --- Loss Functions ---

/// Element-wise `(input - target)^2` without reduction.
pub fn squared_error(input: &Tensor, target: &Tensor) -> Result<Tensor, TensorError> {
    if input.shape() != target.shape() {
        return Err(TensorError::ShapeMismatch {
            expected: target.shape().to_vec(),
            got: input.shape().to_vec(),
        });
    }
    Ok(ops::square(&ops::sub(input, target)?))
}

/// Mean squared error, `mean((input - target)^2)`. Returns a scalar.
pub fn mse_loss(input: &Tensor, target: &Tensor) -> Result<Tensor, TensorError> {
    ops::mean(&squared_error(input, target)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn linear_broadcasts_bias_over_rows() {
        let x = Tensor::from_vec(&[2, 2], vec![1.0, 2.0, 3.0, 4.0], false).unwrap();
        let w = Tensor::from_vec(&[2, 1], vec![1.0, 1.0], false).unwrap();
        let b = Tensor::from_vec(&[1], vec![0.5], false).unwrap();
        let y = linear(&x, &w, Some(&b)).unwrap();
        assert_eq!(y.shape(), &[2, 1]);
        assert_eq!(y.to_vec(), vec![3.5, 7.5]);
    }

    #[test]
    fn mse_is_a_scalar_mean() {
        let x = Tensor::from_vec(&[2], vec![1.0, 3.0], true).unwrap();
        let y = Tensor::from_vec(&[2], vec![0.0, 0.0], false).unwrap();
        let loss = mse_loss(&x, &y).unwrap();
        assert!(loss.is_scalar());
        assert_relative_eq!(loss.item().unwrap(), 5.0);
    }

    #[test]
    fn mse_rejects_mismatched_shapes() {
        let x = Tensor::from_vec(&[2], vec![1.0, 3.0], false).unwrap();
        let y = Tensor::from_vec(&[1], vec![0.0], false).unwrap();
        assert!(matches!(
            mse_loss(&x, &y),
            Err(TensorError::ShapeMismatch { .. })
        ));
    }
}
