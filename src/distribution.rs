//! Squashed-Gaussian action distribution.
//!
//! The policy network emits `[batch, 2 * act_dim]` logits: the first half is
//! the per-dimension mean, the second half the log standard deviation. In
//! stochastic mode an action is a tanh-squashed reparameterized sample, and
//! its log probability carries the exact change-of-variables correction:
//!
//! ```text
//! log π(a|s) = Σ_dims ( log N(u; μ, σ) - log(1 - tanh²(u) + ε) )
//! ```
//!
//! where `u` is the pre-squash sample. In deterministic mode the action is
//! the raw mean, unsquashed, with log probability exactly zero.

use burn::tensor::backend::Backend;
use burn::tensor::{activation::tanh, Distribution, Tensor};

// Constants for numerical stability
pub(crate) const LOG_STD_MIN: f32 = -20.0;
pub(crate) const LOG_STD_MAX: f32 = 2.0;
pub(crate) const SQUASH_EPSILON: f32 = 1e-6;

/// Split policy logits `[batch, 2 * act_dim]` into `(mean, log_std)` halves.
///
/// # Panics
///
/// Panics if the feature width is odd.
pub fn split_logits<B: Backend>(logits: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
    let [batch, width] = logits.dims();
    assert!(
        width % 2 == 0,
        "policy logits must have even feature width, got {}",
        width
    );
    let half = width / 2;
    let mean = logits.clone().slice([0..batch, 0..half]);
    let log_std = logits.slice([0..batch, half..width]);
    (mean, log_std)
}

/// Convert policy logits into an action and its log probability.
///
/// Deterministic mode returns the raw mean and a zero log probability; the
/// tanh squash and Jacobian correction apply only to the stochastic branch.
pub fn logits_to_action<B: Backend>(
    logits: Tensor<B, 2>,
    deterministic: bool,
) -> (Tensor<B, 2>, Tensor<B, 1>) {
    let (mean, log_std) = split_logits(logits);
    if deterministic {
        let batch = mean.dims()[0];
        let log_probs = Tensor::zeros([batch], &mean.device());
        (mean, log_probs)
    } else {
        sample_squashed(mean, log_std)
    }
}

/// Draw a tanh-squashed reparameterized sample and its corrected log probability.
///
/// Returns `(action, log_probs)` with shapes `[batch, act_dim]` / `[batch]`.
pub fn sample_squashed<B: Backend>(
    mean: Tensor<B, 2>,
    log_std: Tensor<B, 2>,
) -> (Tensor<B, 2>, Tensor<B, 1>) {
    let device = mean.device();
    let [batch, act_dim] = mean.dims();

    let log_std = log_std.clamp(LOG_STD_MIN, LOG_STD_MAX);
    let std = log_std.clone().exp();

    // Reparameterization: u = mean + std * noise
    let noise: Tensor<B, 2> =
        Tensor::random([batch, act_dim], Distribution::Normal(0.0, 1.0), &device);
    let raw = mean.clone() + std * noise;

    let squashed = tanh(raw.clone());
    let log_probs = log_prob_from_raw(raw, mean, log_std);

    (squashed, log_probs)
}

/// Log probability of `tanh(raw)` given a Gaussian over `raw`.
///
/// `raw`, `mean`, `log_std` are `[batch, act_dim]`; the result is `[batch]`,
/// summed over action dimensions. `log_std` is clamped to the stability range
/// before use.
pub fn log_prob_from_raw<B: Backend>(
    raw: Tensor<B, 2>,
    mean: Tensor<B, 2>,
    log_std: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let log_std = log_std.clamp(LOG_STD_MIN, LOG_STD_MAX);
    let std = log_std.clone().exp();

    // log N(u; μ, σ) = -0.5 * ((u - μ)/σ)² - log(σ) - 0.5 * log(2π)
    let log_2pi = (2.0 * std::f32::consts::PI).ln();
    let normalized = (raw.clone() - mean) / std;
    let gaussian_per_dim: Tensor<B, 2> =
        -0.5 * normalized.powf_scalar(2.0) - log_std - 0.5 * log_2pi;

    // Jacobian of the tanh squash: log(1 - tanh²(u) + ε)
    let squashed = tanh(raw);
    let jacobian_per_dim: Tensor<B, 2> =
        (-squashed.clone() * squashed + 1.0 + SQUASH_EPSILON).log();

    (gaussian_per_dim - jacobian_per_dim).sum_dim(1).flatten(0, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn scalar_log_prob(raw: f32) -> f32 {
        // Standard normal over raw, single action dimension
        let device = Default::default();
        let raw_t: Tensor<TestBackend, 2> = Tensor::from_floats([[raw]], &device);
        let mean: Tensor<TestBackend, 2> = Tensor::zeros([1, 1], &device);
        let log_std: Tensor<TestBackend, 2> = Tensor::zeros([1, 1], &device);
        let lp = log_prob_from_raw(raw_t, mean, log_std);
        lp.into_data().as_slice::<f32>().unwrap()[0]
    }

    #[test]
    fn test_split_logits_halves() {
        let device = Default::default();
        let logits: Tensor<TestBackend, 2> =
            Tensor::from_floats([[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]], &device);
        let (mean, log_std) = split_logits(logits);
        assert_eq!(mean.dims(), [2, 2]);
        assert_eq!(log_std.dims(), [2, 2]);
        assert_eq!(
            mean.into_data().as_slice::<f32>().unwrap(),
            &[1.0, 2.0, 5.0, 6.0]
        );
        assert_eq!(
            log_std.into_data().as_slice::<f32>().unwrap(),
            &[3.0, 4.0, 7.0, 8.0]
        );
    }

    #[test]
    #[should_panic(expected = "even feature width")]
    fn test_split_logits_rejects_odd_width() {
        let device = Default::default();
        let logits: Tensor<TestBackend, 2> = Tensor::zeros([2, 3], &device);
        let _ = split_logits(logits);
    }

    #[test]
    fn test_deterministic_returns_raw_mean_and_zero_log_prob() {
        let device = Default::default();
        // Mean of 3.0 is outside (-1, 1): proves no tanh is applied
        let logits: Tensor<TestBackend, 2> =
            Tensor::from_floats([[3.0, -2.0, 0.0, 0.0]], &device);
        let (action, log_probs) = logits_to_action(logits, true);

        assert_eq!(
            action.into_data().as_slice::<f32>().unwrap(),
            &[3.0, -2.0]
        );
        assert_eq!(log_probs.dims(), [1]);
        assert_eq!(log_probs.into_data().as_slice::<f32>().unwrap(), &[0.0]);
    }

    #[test]
    fn test_stochastic_actions_bounded_and_finite() {
        let device = Default::default();
        let mean: Tensor<TestBackend, 2> = Tensor::zeros([32, 4], &device);
        let log_std: Tensor<TestBackend, 2> = Tensor::zeros([32, 4], &device);

        let (actions, log_probs) = sample_squashed(mean, log_std);
        assert_eq!(actions.dims(), [32, 4]);
        assert_eq!(log_probs.dims(), [32]);

        let a_data = actions.into_data();
        for &a in a_data.as_slice::<f32>().unwrap() {
            assert!(a > -1.0 && a < 1.0);
        }
        let lp_data = log_probs.into_data();
        for &lp in lp_data.as_slice::<f32>().unwrap() {
            assert!(lp.is_finite());
        }
    }

    #[test]
    fn test_log_prob_decreases_past_tanh_saturation() {
        // Near zero the -log(1 - tanh²(u) + ε) correction grows roughly
        // linearly in |u| and outweighs the Gaussian term, so the squashed
        // density peaks away from the mean. Past the saturation knee the
        // Gaussian tail dominates and the log prob falls monotonically.
        let lp0 = scalar_log_prob(0.0);
        let lp2 = scalar_log_prob(2.0);
        let lp5 = scalar_log_prob(5.0);
        let lp10 = scalar_log_prob(10.0);
        assert!(lp0 < lp2);
        assert!(lp2 > lp5);
        assert!(lp5 > lp10);
    }

    #[test]
    fn test_log_prob_finite_in_saturation_range() {
        for raw in [-10.0, -5.0, -1.0, 0.0, 1.0, 5.0, 10.0] {
            let lp = scalar_log_prob(raw);
            assert!(lp.is_finite(), "log prob at raw={} is {}", raw, lp);
        }
    }

    #[test]
    fn test_log_prob_sums_over_dimensions() {
        let device = Default::default();
        let raw: Tensor<TestBackend, 2> = Tensor::from_floats([[1.0, 1.0]], &device);
        let mean: Tensor<TestBackend, 2> = Tensor::zeros([1, 2], &device);
        let log_std: Tensor<TestBackend, 2> = Tensor::zeros([1, 2], &device);

        let lp2 = log_prob_from_raw(raw, mean, log_std);
        let lp2 = lp2.into_data().as_slice::<f32>().unwrap()[0];
        let lp1 = scalar_log_prob(1.0);
        assert!((lp2 - 2.0 * lp1).abs() < 1e-5);
    }

    #[test]
    fn test_log_std_clamped_before_use() {
        let device = Default::default();
        let raw: Tensor<TestBackend, 2> = Tensor::from_floats([[0.5]], &device);
        let mean: Tensor<TestBackend, 2> = Tensor::zeros([1, 1], &device);
        // Both values are beyond LOG_STD_MAX, so they clamp to the same std
        let huge: Tensor<TestBackend, 2> = Tensor::from_floats([[50.0]], &device);
        let max: Tensor<TestBackend, 2> = Tensor::from_floats([[LOG_STD_MAX]], &device);

        let a = log_prob_from_raw(raw.clone(), mean.clone(), huge);
        let b = log_prob_from_raw(raw, mean, max);
        let a = a.into_data().as_slice::<f32>().unwrap()[0];
        let b = b.into_data().as_slice::<f32>().unwrap()[0];
        assert!((a - b).abs() < 1e-6);
    }
}
