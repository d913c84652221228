//! Learning rate scheduling.
//!
//! Every optimizer in a parameter group owns one [`PolynomialDecay`] schedule.
//! The schedule carries its own step counter, advanced once per optimizer
//! application, so critic schedules advance every gradient call while policy
//! and alpha schedules advance only on delayed steps. The counter is part of
//! checkpoint state (see [`crate::checkpoint`]).
//!
//! # Data Integrity
//!
//! Inputs are validated in debug builds and sanitized in release builds so a
//! bad descriptor degrades to a usable schedule instead of propagating NaN/Inf
//! into optimizer steps.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::LrSchedule;

/// Polynomial decay scheduler with an internal step counter.
///
/// Formula: `lr = end_lr + (base_lr - end_lr) * (1 - step/decay_steps)^power`,
/// held at `end_lr` once `decay_steps` is reached.
#[derive(Debug)]
pub struct PolynomialDecay {
    base_lr: f64,
    end_lr: f64,
    decay_steps: usize,
    power: f64,
    current_step: AtomicUsize,
}

impl Clone for PolynomialDecay {
    fn clone(&self) -> Self {
        Self {
            base_lr: self.base_lr,
            end_lr: self.end_lr,
            decay_steps: self.decay_steps,
            power: self.power,
            current_step: AtomicUsize::new(self.current_step.load(Ordering::Relaxed)),
        }
    }
}

impl PolynomialDecay {
    /// Create a new polynomial decay scheduler.
    ///
    /// # Panics (debug only)
    ///
    /// Panics if `decay_steps` is 0, a learning rate is non-finite or
    /// negative, or `power` is not a positive finite number.
    pub fn new(base_lr: f64, end_lr: f64, decay_steps: usize, power: f64) -> Self {
        debug_assert!(
            decay_steps > 0,
            "PolynomialDecay: decay_steps must be > 0, got {}",
            decay_steps
        );
        debug_assert!(
            base_lr.is_finite() && base_lr >= 0.0,
            "PolynomialDecay: base_lr must be finite and non-negative, got {}",
            base_lr
        );
        debug_assert!(
            end_lr.is_finite() && end_lr >= 0.0,
            "PolynomialDecay: end_lr must be finite and non-negative, got {}",
            end_lr
        );
        debug_assert!(
            power.is_finite() && power > 0.0,
            "PolynomialDecay: power must be > 0 (got {}). Use power=1.0 for linear decay.",
            power
        );

        // Sanitize in release builds
        let base_lr = if base_lr.is_finite() && base_lr >= 0.0 {
            base_lr
        } else {
            0.0
        };
        let end_lr = if end_lr.is_finite() && end_lr >= 0.0 {
            end_lr
        } else {
            0.0
        };
        let power = if power.is_finite() && power > 0.0 {
            power
        } else {
            1.0
        };

        Self {
            base_lr,
            end_lr,
            decay_steps,
            power,
            current_step: AtomicUsize::new(0),
        }
    }

    /// Build from a config descriptor.
    pub fn from_schedule(schedule: &LrSchedule) -> Self {
        Self::new(
            schedule.initial_lr,
            schedule.end_lr,
            schedule.decay_steps,
            schedule.power,
        )
    }

    /// Learning rate at a given step, without advancing the counter.
    pub fn get_lr(&self, step: usize) -> f64 {
        if self.decay_steps == 0 {
            return self.base_lr;
        }

        let step = step.min(self.decay_steps);
        let progress = (step as f64) / (self.decay_steps as f64);
        let decay = (1.0 - progress).powf(self.power);
        let lr = self.end_lr + (self.base_lr - self.end_lr) * decay;

        // Clamp to prevent runaway values from float edge cases
        if lr.is_finite() {
            let max_lr = self.base_lr.max(self.end_lr);
            lr.max(0.0).min(max_lr)
        } else {
            self.end_lr
        }
    }

    /// Return the learning rate for the current step and advance the counter.
    pub fn step(&self) -> f64 {
        let step = self.current_step.fetch_add(1, Ordering::SeqCst);
        self.get_lr(step)
    }

    /// Number of times [`step`](Self::step) has been called.
    pub fn current_step(&self) -> usize {
        self.current_step.load(Ordering::SeqCst)
    }

    /// Overwrite the step counter, used when resuming from a checkpoint.
    pub fn restore_step(&self, step: usize) {
        self.current_step.store(step, Ordering::SeqCst);
    }

    /// Get the base (initial) learning rate.
    pub fn base_lr(&self) -> f64 {
        self.base_lr
    }

    /// Get the end (final) learning rate.
    pub fn end_lr(&self) -> f64 {
        self.end_lr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polynomial_decay_linear() {
        // power=1.0 is linear interpolation
        let sched = PolynomialDecay::new(1.0, 0.0, 100, 1.0);

        assert!((sched.get_lr(0) - 1.0).abs() < 1e-10);
        assert!((sched.get_lr(50) - 0.5).abs() < 1e-10);
        assert!((sched.get_lr(100) - 0.0).abs() < 1e-10);
        // Clamps past the decay horizon
        assert!((sched.get_lr(200) - 0.0).abs() < 1e-10);
    }

    #[test]
    fn test_polynomial_decay_quadratic() {
        let sched = PolynomialDecay::new(1.0, 0.0, 100, 2.0);
        assert!((sched.get_lr(50) - 0.25).abs() < 1e-10);
    }

    #[test]
    fn test_end_lr_floor() {
        let sched = PolynomialDecay::new(3e-4, 1e-5, 10, 1.0);
        assert!((sched.get_lr(10) - 1e-5).abs() < 1e-12);
        assert!((sched.get_lr(10_000) - 1e-5).abs() < 1e-12);
    }

    #[test]
    fn test_step_increments() {
        let sched = PolynomialDecay::new(1.0, 0.0, 10, 1.0);

        assert!((sched.step() - 1.0).abs() < 1e-10); // step 0
        assert!((sched.step() - 0.9).abs() < 1e-10); // step 1
        assert!((sched.step() - 0.8).abs() < 1e-10); // step 2
        assert_eq!(sched.current_step(), 3);
    }

    #[test]
    fn test_restore_step() {
        let sched = PolynomialDecay::new(1.0, 0.0, 10, 1.0);
        sched.restore_step(5);
        assert_eq!(sched.current_step(), 5);
        assert!((sched.step() - 0.5).abs() < 1e-10);
        assert_eq!(sched.current_step(), 6);
    }

    #[test]
    fn test_from_schedule_defaults() {
        let sched = PolynomialDecay::from_schedule(&LrSchedule::default());
        assert!((sched.get_lr(0) - 3e-4).abs() < 1e-12);
        assert!((sched.get_lr(100_000) - 1e-5).abs() < 1e-12);
    }
}
