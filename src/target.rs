//! Target network smoothing via Polyak averaging.
//!
//! Target copies track their live counterparts through
//! `θ_target = τ * θ_live + (1 - τ) * θ_target`, applied per parameter tensor
//! by traversal position. The blend runs only on delayed-update steps (see
//! [`crate::router`]); this module is pure and stateless.

use burn::module::{Module, ModuleMapper, Param};
use burn::prelude::*;

use crate::weights::flatten_params;

/// Blends flattened source parameters into target parameters by position.
struct PolyakMapper<B: Backend> {
    source_params: Vec<Tensor<B, 1>>,
    tau: f32,
    index: usize,
}

impl<B: Backend> ModuleMapper<B> for PolyakMapper<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let target_val = param.val();
        let shape = target_val.dims();
        let numel: usize = shape.iter().product();

        let idx = self.index;
        self.index += 1;
        let source = self.source_params.get(idx).unwrap_or_else(|| {
            panic!("source has no parameter at position {}", idx)
        });

        let target_flat = target_val.reshape([numel]);
        let blended = source.clone().mul_scalar(self.tau)
            + target_flat.mul_scalar(1.0 - self.tau);

        Param::initialized(param.id.clone(), blended.reshape(shape))
    }
}

/// Polyak (soft) update: `target ← τ * source + (1 - τ) * target`.
///
/// Parameters are matched by traversal order, so source and target must share
/// an architecture. τ = 1 is a hard copy; τ = 0 leaves the target untouched.
pub fn soft_update<B, M>(source: &M, target: M, tau: f32) -> M
where
    B: Backend,
    M: Module<B>,
{
    if (tau - 1.0).abs() < 1e-6 {
        return source.clone();
    }
    if tau.abs() < 1e-6 {
        return target;
    }

    let mut mapper = PolyakMapper {
        source_params: flatten_params(source),
        tau,
        index: 0,
    };
    target.map(&mut mapper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::nn::LinearConfig;

    type TestBackend = NdArray<f32>;

    fn weights(linear: &burn::nn::Linear<TestBackend>) -> Vec<f32> {
        linear
            .weight
            .val()
            .into_data()
            .as_slice::<f32>()
            .unwrap()
            .to_vec()
    }

    #[test]
    fn test_tau_one_is_hard_copy() {
        let device = Default::default();
        let source = LinearConfig::new(4, 4).init::<TestBackend>(&device);
        let target = LinearConfig::new(4, 4).init::<TestBackend>(&device);

        let updated = soft_update::<TestBackend, _>(&source, target, 1.0);
        assert_eq!(weights(&source), weights(&updated));
    }

    #[test]
    fn test_tau_zero_leaves_target() {
        let device = Default::default();
        let source = LinearConfig::new(4, 4).init::<TestBackend>(&device);
        let target = LinearConfig::new(4, 4).init::<TestBackend>(&device);
        let before = weights(&target);

        let updated = soft_update::<TestBackend, _>(&source, target, 0.0);
        assert_eq!(before, weights(&updated));
    }

    #[test]
    fn test_interpolation() {
        let device = Default::default();
        let source = LinearConfig::new(4, 4).init::<TestBackend>(&device);
        let target = LinearConfig::new(4, 4).init::<TestBackend>(&device);

        let s = weights(&source);
        let t = weights(&target);
        let tau = 0.5f32;

        let updated = soft_update::<TestBackend, _>(&source, target, tau);
        let u = weights(&updated);

        for i in 0..s.len() {
            let expected = tau * s[i] + (1.0 - tau) * t[i];
            assert!((u[i] - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_typical_small_tau() {
        let device = Default::default();
        let source = LinearConfig::new(8, 2).init::<TestBackend>(&device);
        let target = LinearConfig::new(8, 2).init::<TestBackend>(&device);

        let s = weights(&source);
        let t = weights(&target);
        let tau = 0.005f32;

        let updated = soft_update::<TestBackend, _>(&source, target, tau);
        let u = weights(&updated);

        for i in 0..s.len() {
            let expected = tau * s[i] + (1.0 - tau) * t[i];
            assert!((u[i] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_bias_also_blended() {
        let device = Default::default();
        let source = LinearConfig::new(4, 4)
            .with_bias(true)
            .init::<TestBackend>(&device);
        let target = LinearConfig::new(4, 4)
            .with_bias(true)
            .init::<TestBackend>(&device);

        let s = source.bias.as_ref().unwrap().val().into_data();
        let t = target.bias.as_ref().unwrap().val().into_data();
        let s = s.as_slice::<f32>().unwrap();
        let t = t.as_slice::<f32>().unwrap();

        let tau = 0.3f32;
        let updated = soft_update::<TestBackend, _>(&source, target, tau);
        let u = updated.bias.as_ref().unwrap().val().into_data();
        let u = u.as_slice::<f32>().unwrap();

        for i in 0..s.len() {
            let expected = tau * s[i] + (1.0 - tau) * t[i];
            assert!((u[i] - expected).abs() < 1e-5);
        }
    }
}
