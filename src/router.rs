//! Gradient routing and the delayed-update schedule.
//!
//! Gradients are computed by the outer training loop and handed over as a
//! [`GradientBundle`]: one named group of flattened tensors per trainable
//! module. Critic optimizers apply on every call; the policy, the entropy
//! coefficient, and all target smoothings apply only when the [`DelayGate`]
//! fires. A `policy_only` group routes everything to the policy optimizer
//! with no gating.
//!
//! The bundle's name set must exactly match the group's trainable modules.
//! A missing or unknown name is a fatal contract violation, as are tensor
//! count or length mismatches within a group.

use std::collections::BTreeMap;

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::agent::ActorCriticCore;
use crate::target::soft_update;
use crate::weights::bind_gradients;

/// Gradients grouped by trainable-module name.
///
/// Within a group, tensors are flattened to 1D and ordered by the module's
/// parameter traversal order, matching
/// [`ActorCriticCore::gradient_layout`].
pub struct GradientBundle<B: Backend> {
    groups: BTreeMap<String, Vec<Tensor<B, 1>>>,
}

impl<B: Backend> GradientBundle<B> {
    pub fn new() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }

    /// Add one module's gradient group. Replaces any previous group with the
    /// same name.
    pub fn insert(&mut self, name: impl Into<String>, tensors: Vec<Tensor<B, 1>>) {
        self.groups.insert(name.into(), tensors);
    }

    /// Group names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.groups.keys().map(|s| s.as_str()).collect()
    }

    pub(crate) fn take(&mut self, name: &str) -> Option<Vec<Tensor<B, 1>>> {
        self.groups.remove(name)
    }

    /// Rebuild a bundle from a flat tensor list in the legacy positional
    /// order, using the layout reported by
    /// [`ActorCriticCore::gradient_layout`].
    ///
    /// # Panics
    ///
    /// Panics if the flat list's length does not equal the layout total.
    pub fn from_flat(layout: &[(String, usize)], flat: Vec<Tensor<B, 1>>) -> Self {
        let total: usize = layout.iter().map(|(_, count)| count).sum();
        assert!(
            flat.len() == total,
            "flat gradient list has {} tensors, layout expects {}",
            flat.len(),
            total
        );

        let mut bundle = Self::new();
        let mut iter = flat.into_iter();
        for (name, count) in layout {
            let tensors: Vec<Tensor<B, 1>> = iter.by_ref().take(*count).collect();
            bundle.insert(name.clone(), tensors);
        }
        bundle
    }
}

impl<B: Backend> Default for GradientBundle<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Decides which gradient calls are delayed-update steps.
///
/// Fires on the first call and every `period`-th call thereafter, matching
/// an `iteration % period == 0` schedule over consecutive iterations without
/// trusting the caller's counter.
#[derive(Debug, Clone)]
pub(crate) struct DelayGate {
    period: u64,
    since_last: u64,
}

impl DelayGate {
    pub(crate) fn new(period: u64) -> Self {
        assert!(period > 0, "delay period must be positive");
        Self {
            period,
            since_last: 0,
        }
    }

    /// Advance by one call; returns whether this call is a delayed-update step.
    pub(crate) fn tick(&mut self) -> bool {
        let fire = self.since_last == 0;
        self.since_last = (self.since_last + 1) % self.period;
        fire
    }

    /// Calls since the last delayed-update step, for checkpointing.
    pub(crate) fn phase(&self) -> u64 {
        self.since_last
    }

    /// Re-enter a checkpointed phase. Reduced modulo the period in case the
    /// saved run used a different delay setting.
    pub(crate) fn restore_phase(&mut self, phase: u64) {
        self.since_last = phase % self.period;
    }
}

impl<B: AutodiffBackend> ActorCriticCore<B> {
    /// Route one iteration's gradients into the group's optimizers.
    ///
    /// Critic gradients apply on every call. Policy and alpha gradients, and
    /// the Polyak smoothing of every target copy, apply only on delayed-update
    /// steps. The `iteration` counter is caller-owned and used for logging;
    /// the delay schedule is internal state.
    ///
    /// # Panics
    ///
    /// Panics if the bundle's name set differs from the group's trainable
    /// modules, or any group's tensor count or tensor length mismatches the
    /// module it targets.
    pub fn apply_gradients(&mut self, iteration: u64, mut grads: GradientBundle<B::InnerBackend>) {
        let mut expected: Vec<&str> = self.trainable_module_names();
        expected.sort_unstable();
        let found = grads.names();
        assert!(
            expected == found,
            "gradient bundle names {:?} do not match trainable modules {:?}",
            found,
            expected
        );

        if self.config.policy_only {
            let group = grads.take(self.policy.name).unwrap();
            let bound = bind_gradients(&self.policy.module, &group);
            self.policy.apply(bound);
            log::trace!("iteration {}: policy-only update applied", iteration);
            return;
        }

        if let Some(q1) = &mut self.q1 {
            let group = grads.take(q1.name).unwrap();
            let bound = bind_gradients(&q1.module, &group);
            q1.apply(bound);
        }
        if let Some(q2) = &mut self.q2 {
            let group = grads.take(q2.name).unwrap();
            let bound = bind_gradients(&q2.module, &group);
            q2.apply(bound);
        }

        let delayed = self.delay_gate.tick();
        if delayed {
            let group = grads.take(self.policy.name).unwrap();
            let bound = bind_gradients(&self.policy.module, &group);
            self.policy.apply(bound);

            if let Some(alpha) = &mut self.alpha {
                let group = grads.take(alpha.name).unwrap();
                let bound = bind_gradients(&alpha.module, &group);
                alpha.apply(bound);
            }

            if self.config.target {
                let tau = self.config.tau;
                if let (Some(q1), Some(target)) = (&self.q1, self.q1_target.take()) {
                    self.q1_target = Some(soft_update(&q1.module, target, tau));
                }
                if let (Some(q2), Some(target)) = (&self.q2, self.q2_target.take()) {
                    self.q2_target = Some(soft_update(&q2.module, target, tau));
                }
                if let Some(target) = self.policy_target.take() {
                    self.policy_target = Some(soft_update(&self.policy.module, target, tau));
                }
            }
        }
        log::trace!(
            "iteration {}: critics updated, delayed update fired: {}",
            iteration,
            delayed
        );
    }
}
