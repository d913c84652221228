//! Feed-forward MLP used for the policy and both critics.
//!
//! A plain stack of `Linear` layers with a shared hidden activation and a
//! configurable output activation. The policy uses an output width of
//! `2 * act_dim` (mean and log-std halves); critics use an output width of 1.

use burn::module::{Ignored, Module};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation;

use crate::config::Activation;

impl Activation {
    /// Apply this activation to a tensor.
    pub fn apply<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Activation::Linear => x,
            Activation::Relu => activation::relu(x),
            Activation::Tanh => activation::tanh(x),
            Activation::Gelu => activation::gelu(x),
        }
    }
}

/// Configuration for [`MlpNet`].
#[derive(Debug, Clone)]
pub struct MlpNetConfig {
    /// Number of input features.
    pub d_input: usize,
    /// Number of output features.
    pub d_output: usize,
    /// Number of hidden layers.
    pub hidden_layers: usize,
    /// Width of each hidden layer.
    pub hidden_units: usize,
    /// Activation between hidden layers.
    pub hidden_activation: Activation,
    /// Activation on the output layer.
    pub output_activation: Activation,
}

impl MlpNetConfig {
    pub fn new(d_input: usize, d_output: usize) -> Self {
        Self {
            d_input,
            d_output,
            hidden_layers: 2,
            hidden_units: 64,
            hidden_activation: Activation::Gelu,
            output_activation: Activation::Linear,
        }
    }

    pub fn with_hidden(mut self, layers: usize, units: usize) -> Self {
        self.hidden_layers = layers;
        self.hidden_units = units;
        self
    }

    pub fn with_hidden_activation(mut self, activation: Activation) -> Self {
        self.hidden_activation = activation;
        self
    }

    pub fn with_output_activation(mut self, activation: Activation) -> Self {
        self.output_activation = activation;
        self
    }

    /// Initialize the network on the given device.
    pub fn init<B: Backend>(&self, device: &B::Device) -> MlpNet<B> {
        let mut hidden = Vec::with_capacity(self.hidden_layers);
        let mut width = self.d_input;
        for _ in 0..self.hidden_layers {
            hidden.push(LinearConfig::new(width, self.hidden_units).init(device));
            width = self.hidden_units;
        }
        let output = LinearConfig::new(width, self.d_output).init(device);

        MlpNet {
            hidden,
            output,
            hidden_activation: Ignored(self.hidden_activation),
            output_activation: Ignored(self.output_activation),
        }
    }
}

/// Feed-forward network: `hidden_layers` Linear layers plus an output Linear.
#[derive(Module, Debug)]
pub struct MlpNet<B: Backend> {
    hidden: Vec<Linear<B>>,
    output: Linear<B>,
    hidden_activation: Ignored<Activation>,
    output_activation: Ignored<Activation>,
}

impl<B: Backend> MlpNet<B> {
    /// Forward pass over a `[batch, d_input]` tensor.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = input;
        for layer in &self.hidden {
            x = self.hidden_activation.0.apply(layer.forward(x));
        }
        self.output_activation.0.apply(self.output.forward(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let net = MlpNetConfig::new(6, 4)
            .with_hidden(2, 16)
            .init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 2>::random(
            [3, 6],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let out = net.forward(input);
        assert_eq!(out.dims(), [3, 4]);
    }

    #[test]
    fn test_zero_hidden_layers_is_single_linear() {
        let device = Default::default();
        let net = MlpNetConfig::new(5, 1)
            .with_hidden(0, 64)
            .init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 2>::random(
            [2, 5],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        assert_eq!(net.forward(input).dims(), [2, 1]);
    }

    #[test]
    fn test_tanh_output_activation_bounds() {
        let device = Default::default();
        let net = MlpNetConfig::new(4, 3)
            .with_output_activation(Activation::Tanh)
            .init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 2>::random(
            [8, 4],
            Distribution::Normal(0.0, 10.0),
            &device,
        );
        let out = net.forward(input).into_data();
        for v in out.as_slice::<f32>().unwrap() {
            assert!(*v >= -1.0 && *v <= 1.0);
        }
    }

    #[test]
    fn test_clone_is_exact_copy() {
        let device = Default::default();
        let net = MlpNetConfig::new(4, 2).init::<TestBackend>(&device);
        let copy = net.clone();

        let input = Tensor::<TestBackend, 2>::random(
            [2, 4],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let a = net.forward(input.clone()).into_data();
        let b = copy.forward(input).into_data();
        assert_eq!(
            a.as_slice::<f32>().unwrap(),
            b.as_slice::<f32>().unwrap()
        );
    }
}
