//! # Dense Layer Module

use super::activation::Activation;
use crate::maml::{MamlError, ParameterResolver};
use crate::nn::functional as F;
use crate::nn::init::Initializer;
use crate::nn::Module;
use crate::tensor::Tensor;

/// Fully connected layer: `y = activation(x @ W + b)`.
///
/// Owns no tensors. On every forward pass it asks the resolver for
/// `{scope}/weight` (shape `[in_features, out_features]`) and, if enabled,
/// `{scope}/bias` (shape `[out_features]`), so the same layer can run on
/// base or adapted parameters.
///
/// Input shape: `(N, in_features)`. Output shape: `(N, out_features)`.
#[derive(Debug, Clone)]
pub struct Dense {
    scope: String,
    in_features: usize,
    out_features: usize,
    use_bias: bool,
    activation: Activation,
    weight_init: Initializer,
    bias_init: Initializer,
}

impl Dense {
    /// Creates a new Dense layer with Kaiming-uniform weights and zero bias.
    pub fn new(scope: impl Into<String>, in_features: usize, out_features: usize) -> Self {
        Dense {
            scope: scope.into(),
            in_features,
            out_features,
            use_bias: true,
            activation: Activation::Identity,
            weight_init: Initializer::KaimingUniform {
                fan_in: in_features,
                seed: None,
            },
            bias_init: Initializer::Zeros,
        }
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_bias(mut self, use_bias: bool) -> Self {
        self.use_bias = use_bias;
        self
    }

    pub fn with_weight_init(mut self, init: Initializer) -> Self {
        self.weight_init = init;
        self
    }

    pub fn with_bias_init(mut self, init: Initializer) -> Self {
        self.bias_init = init;
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn weight_name(&self) -> String {
        format!("{}/weight", self.scope)
    }

    pub fn bias_name(&self) -> String {
        format!("{}/bias", self.scope)
    }
}

impl Module for Dense {
    fn forward(
        &self,
        resolver: &mut dyn ParameterResolver,
        input: &Tensor,
    ) -> Result<Tensor, MamlError> {
        let weight = resolver.resolve(
            &self.weight_name(),
            &[self.in_features, self.out_features],
            &self.weight_init,
        )?;
        let bias = if self.use_bias {
            Some(resolver.resolve(&self.bias_name(), &[self.out_features], &self.bias_init)?)
        } else {
            None
        };
        let output = F::linear(input, &weight, bias.as_ref())?;
        Ok(self.activation.apply(&output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maml::ParameterStore;

    #[test]
    fn resolves_scoped_parameters() {
        let mut store = ParameterStore::new();
        let layer = Dense::new("encoder", 3, 2)
            .with_weight_init(Initializer::Constant(1.0))
            .with_bias_init(Initializer::Constant(-4.0))
            .with_activation(Activation::Relu);
        let x = Tensor::from_vec(&[1, 3], vec![1.0, 2.0, 3.0], false).unwrap();

        let y = layer.forward(&mut store, &x).unwrap();
        assert_eq!(y.shape(), &[1, 2]);
        assert_eq!(y.to_vec(), vec![2.0, 2.0]);
        assert_eq!(
            store.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            vec!["encoder/weight", "encoder/bias"]
        );
    }

    #[test]
    fn bias_can_be_disabled() {
        let mut store = ParameterStore::new();
        let layer = Dense::new("head", 2, 1)
            .with_bias(false)
            .with_weight_init(Initializer::Zeros);
        let x = Tensor::from_vec(&[1, 2], vec![1.0, 1.0], false).unwrap();
        layer.forward(&mut store, &x).unwrap();
        assert!(!store.contains("head/bias"));
    }
}
