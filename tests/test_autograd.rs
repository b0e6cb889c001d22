use approx::assert_abs_diff_eq;
use rtorch_maml::nn::functional::linear;
use rtorch_maml::tensor::{full, gradients, ops, Tensor, TensorError};

fn t(shape: &[usize], values: &[f32], requires_grad: bool) -> Tensor {
    Tensor::from_vec(shape, values.to_vec(), requires_grad).unwrap()
}

#[test]
fn matmul_gradients_match_the_closed_form() {
    let a = t(&[1, 2], &[1.0, 2.0], true);
    let b = t(&[2, 1], &[3.0, 4.0], true);
    let y = ops::sum(&ops::matmul(&a, &b).unwrap()).unwrap();

    let grads = gradients(&y, &[a, b], false).unwrap();
    assert_eq!(grads[0].as_ref().unwrap().to_vec(), vec![3.0, 4.0]);
    assert_eq!(grads[1].as_ref().unwrap().to_vec(), vec![1.0, 2.0]);
}

#[test]
fn linear_layer_gradients_reduce_over_the_batch() {
    let x = t(&[2, 2], &[1.0, 2.0, 3.0, 4.0], false);
    let w = t(&[2, 1], &[0.5, -0.5], true);
    let b = t(&[1], &[0.0], true);
    let y = ops::sum(&linear(&x, &w, Some(&b)).unwrap()).unwrap();

    y.backward().unwrap();
    assert_eq!(w.grad().unwrap().to_vec(), vec![4.0, 6.0]);
    assert_eq!(b.grad().unwrap().to_vec(), vec![2.0]);
}

#[test]
fn backward_needs_a_differentiable_scalar() {
    let constant = Tensor::scalar(1.0, false);
    assert!(matches!(
        constant.backward(),
        Err(TensorError::RequiresGradNotSet)
    ));

    let vector = full(&[3], 1.0, true);
    let doubled = ops::mul_scalar(&vector, 2.0);
    assert!(matches!(doubled.backward(), Err(TensorError::NotScalar { .. })));
}

#[test]
fn second_order_through_a_dense_layer() {
    // L = (x w)^2 with x = 2  =>  dL/dw = 8w, d(dL/dw)/dw = 8
    let x = t(&[1, 1], &[2.0], false);
    let w = t(&[1, 1], &[1.0], true);
    let loss = ops::sum(&ops::square(&ops::matmul(&x, &w).unwrap())).unwrap();

    let g = gradients(&loss, &[w.clone()], true).unwrap().remove(0).unwrap();
    assert_abs_diff_eq!(g.item().unwrap(), 8.0);

    let h = gradients(&ops::sum(&g).unwrap(), &[w], false)
        .unwrap()
        .remove(0)
        .unwrap();
    assert_abs_diff_eq!(h.item().unwrap(), 8.0);
}

#[test]
fn activation_gradients() {
    let x = t(&[2], &[-1.0, 2.0], true);
    let relu_grad = gradients(&ops::sum(&ops::relu(&x)).unwrap(), &[x.clone()], false)
        .unwrap()
        .remove(0)
        .unwrap();
    assert_eq!(relu_grad.to_vec(), vec![0.0, 1.0]);

    let z = Tensor::scalar(0.5, true);
    let tanh_grad = gradients(&ops::tanh(&z), &[z], false)
        .unwrap()
        .remove(0)
        .unwrap();
    assert_abs_diff_eq!(tanh_grad.item().unwrap(), 1.0 - 0.5f32.tanh().powi(2), epsilon = 1e-6);
}

#[test]
fn stop_gradient_blocks_flow() {
    let x = Tensor::scalar(3.0, true);
    let y = ops::mul(&ops::stop_gradient(&x), &x).unwrap();
    // Only the non-stopped factor contributes: dy/dx = x.
    let grad = gradients(&y, &[x], false).unwrap().remove(0).unwrap();
    assert_abs_diff_eq!(grad.item().unwrap(), 3.0);
}

#[test]
fn detached_values_share_storage() {
    let x = t(&[2], &[1.0, 2.0], true);
    let d = x.detach();
    assert!(!d.requires_grad());
    assert!(!d.same_node(&x));
    if let Some(first) = x.data_mut().iter_mut().next() {
        *first = 5.0;
    }
    assert_eq!(d.to_vec(), vec![5.0, 2.0]);
}
