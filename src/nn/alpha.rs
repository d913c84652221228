//! Learnable entropy coefficient.
//!
//! The coefficient α weights the policy's entropy bonus. It is optimized in
//! log space so α stays positive regardless of optimizer steps. Holding the
//! scalar in a proper module lets it share the optimizer and record paths
//! with the networks.

use burn::module::{Module, Param};
use burn::prelude::*;

/// Scalar module holding `log(alpha)` as its single learnable parameter.
#[derive(Module, Debug)]
pub struct AlphaCoeff<B: Backend> {
    log_alpha: Param<Tensor<B, 1>>,
}

impl<B: Backend> AlphaCoeff<B> {
    /// Create with `exp(log_alpha) = initial_alpha`.
    pub fn new(initial_alpha: f32, device: &B::Device) -> Self {
        let log_alpha_value = initial_alpha.ln();
        Self {
            log_alpha: Param::from_tensor(Tensor::from_floats([log_alpha_value], device)),
        }
    }

    /// The `log_alpha` tensor, shape `[1]`. Differentiable on autodiff backends.
    pub fn log_alpha(&self) -> Tensor<B, 1> {
        self.log_alpha.val()
    }

    /// Current coefficient value, `exp(log_alpha)`.
    pub fn alpha(&self) -> f32 {
        let data = self.log_alpha.val().exp().into_data();
        data.as_slice::<f32>().map(|s| s[0]).unwrap_or(f32::NAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_initial_alpha_round_trip() {
        let device = Default::default();
        let coeff: AlphaCoeff<TestBackend> = AlphaCoeff::new(0.2, &device);
        assert!((coeff.alpha() - 0.2).abs() < 1e-6);

        let log_val = coeff.log_alpha().into_data();
        let log_val = log_val.as_slice::<f32>().unwrap()[0];
        assert!((log_val - 0.2_f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn test_alpha_one_has_zero_log() {
        let device = Default::default();
        let coeff: AlphaCoeff<TestBackend> = AlphaCoeff::new(1.0, &device);
        let log_val = coeff.log_alpha().into_data();
        assert!(log_val.as_slice::<f32>().unwrap()[0].abs() < 1e-7);
    }
}
