//! Benchmarks for a full inner loop on a small two-layer regressor.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rtorch_maml::maml::{
    Hyperparams, MamlConfig, MamlError, MamlInnerLoop, MamlModel, Mode, ParameterResolver,
    ParameterStore, TrainOutput,
};
use rtorch_maml::nn::functional as F;
use rtorch_maml::nn::{Activation, Dense, Initializer, Module, Sequential};
use rtorch_maml::tensor::Tensor;

struct Regressor {
    net: Sequential,
}

impl Regressor {
    fn new(hidden: usize) -> Self {
        let net = Sequential::new()
            .push(
                Dense::new("encoder", 4, hidden)
                    .with_activation(Activation::Tanh)
                    .with_weight_init(Initializer::KaimingUniform {
                        fan_in: 4,
                        seed: Some(1),
                    }),
            )
            .push(Dense::new("decoder", hidden, 1).with_weight_init(
                Initializer::KaimingUniform {
                    fan_in: hidden,
                    seed: Some(2),
                },
            ));
        Regressor { net }
    }
}

impl MamlModel for Regressor {
    type Features = Tensor;
    type Labels = Tensor;
    type Outputs = Tensor;
    type Aux = ();

    fn build_inference(
        &self,
        features: &Tensor,
        _labels: &Tensor,
        _mode: Mode,
        _params: &Hyperparams,
        resolver: &mut dyn ParameterResolver,
    ) -> Result<Tensor, MamlError> {
        self.net.forward(resolver, features)
    }

    fn build_train(
        &self,
        _features: &Tensor,
        labels: &Tensor,
        outputs: &Tensor,
        _mode: Mode,
        _config: &MamlConfig,
        _params: &Hyperparams,
    ) -> Result<TrainOutput<()>, MamlError> {
        Ok(TrainOutput::Loss(F::mse_loss(outputs, labels)?))
    }
}

/// Generate `count` batches of 16 samples of `y = sum(x)`
fn generate_batches(count: usize) -> Vec<(Tensor, Tensor)> {
    (0..count)
        .map(|b| {
            let x: Vec<f32> = (0..64).map(|i| ((i + b) % 7) as f32 / 7.0).collect();
            let y: Vec<f32> = x.chunks(4).map(|row| row.iter().sum()).collect();
            (
                Tensor::from_vec(&[16, 4], x, false).unwrap(),
                Tensor::from_vec(&[16, 1], y, false).unwrap(),
            )
        })
        .collect()
}

fn bench_inner_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("inner_loop");
    let model = Regressor::new(32);

    for steps in [1usize, 3, 5] {
        let batches = generate_batches(steps + 1);
        for second_order in [false, true] {
            let label = if second_order { "second_order" } else { "first_order" };
            group.bench_with_input(BenchmarkId::new(label, steps), &batches, |b, batches| {
                let config = MamlConfig::new(0.01).with_second_order(second_order);
                let mut store = ParameterStore::new();
                b.iter(|| {
                    let mut maml = MamlInnerLoop::new(config.clone()).unwrap();
                    let out = maml
                        .inner_loop(&mut store, batches, &model, Mode::Train, None)
                        .unwrap();
                    black_box(out.inner_losses.len())
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_inner_loop);
criterion_main!(benches);
