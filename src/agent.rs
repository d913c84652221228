//! The parameter group: networks, optimizers, targets, and their topology.
//!
//! [`ActorCriticCore`] owns every learnable module of one agent. Which slots
//! exist is resolved once at construction from the [`AgentConfig`] flags;
//! after that, call sites only ever check slot presence. The trainable order
//! is fixed: `Q1`, `Q2` (if twin critics), `policy`, `alpha` (if learned),
//! with targets ordered `Q1_target`, `Q2_target`, `policy_target`.
//!
//! Gradient routing and the delayed-update schedule live in [`crate::router`];
//! persistence lives in [`crate::checkpoint`].

use burn::module::AutodiffModule;
use burn::optim::GradientsParams;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::config::{AgentConfig, AlphaMode, ConfigError};
use crate::distribution::logits_to_action;
use crate::nn::alpha::AlphaCoeff;
use crate::nn::mlp::{MlpNet, MlpNetConfig};
use crate::optim::ScheduledAdam;
use crate::router::DelayGate;
use crate::weights::{flatten_params, inject_params, param_count};

pub(crate) const POLICY: &str = "policy";
pub(crate) const Q1: &str = "Q1";
pub(crate) const Q2: &str = "Q2";
pub(crate) const ALPHA: &str = "alpha";
pub(crate) const POLICY_TARGET: &str = "policy_target";
pub(crate) const Q1_TARGET: &str = "Q1_target";
pub(crate) const Q2_TARGET: &str = "Q2_target";

/// A trainable module paired 1:1 with its optimizer.
pub(crate) struct ModuleSlot<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    pub(crate) name: &'static str,
    pub(crate) module: M,
    pub(crate) optimizer: ScheduledAdam<B, M>,
}

impl<B, M> ModuleSlot<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    fn new(
        name: &'static str,
        module: M,
        optimizer_name: &str,
        schedule: &crate::config::LrSchedule,
    ) -> Self {
        Self {
            name,
            module,
            optimizer: ScheduledAdam::new(optimizer_name, schedule),
        }
    }

    /// One optimizer step; the module is replaced with its updated copy.
    pub(crate) fn apply(&mut self, grads: GradientsParams) {
        self.module = self.optimizer.apply(self.module.clone(), grads);
    }
}

/// One agent's complete parameter group.
pub struct ActorCriticCore<B: AutodiffBackend> {
    pub(crate) config: AgentConfig,
    pub(crate) device: B::Device,
    pub(crate) policy: ModuleSlot<B, MlpNet<B>>,
    pub(crate) q1: Option<ModuleSlot<B, MlpNet<B>>>,
    pub(crate) q2: Option<ModuleSlot<B, MlpNet<B>>>,
    pub(crate) alpha: Option<ModuleSlot<B, AlphaCoeff<B>>>,
    pub(crate) policy_target: Option<MlpNet<B>>,
    pub(crate) q1_target: Option<MlpNet<B>>,
    pub(crate) q2_target: Option<MlpNet<B>>,
    pub(crate) delay_gate: DelayGate,
}

impl<B: AutodiffBackend> ActorCriticCore<B> {
    /// Build the full parameter group for the given dimensions and flags.
    ///
    /// Target copies are exact clones of their live modules. Invalid flag
    /// combinations are rejected here and nowhere downgraded.
    pub fn new(
        obs_dim: usize,
        act_dim: usize,
        config: AgentConfig,
        device: &B::Device,
    ) -> Result<Self, ConfigError> {
        if obs_dim == 0 || act_dim == 0 {
            return Err(ConfigError::InvalidDimension { obs_dim, act_dim });
        }
        config.validate()?;

        let policy_net = MlpNetConfig::new(obs_dim, 2 * act_dim)
            .with_hidden(config.num_hidden_layers, config.num_hidden_units)
            .with_hidden_activation(config.hidden_activation)
            .with_output_activation(config.policy_out_activation)
            .init(device);
        let policy = ModuleSlot::new(
            POLICY,
            policy_net,
            "policy_adam_opt",
            &config.policy_lr_schedule,
        );

        let critic_config = MlpNetConfig::new(obs_dim + act_dim, 1)
            .with_hidden(config.num_hidden_layers, config.num_hidden_units)
            .with_hidden_activation(config.hidden_activation);

        let (q1, q2, alpha, policy_target, q1_target, q2_target) = if config.policy_only {
            (None, None, None, None, None, None)
        } else {
            let q1_net = critic_config.init(device);
            let q1_target = config.target.then(|| q1_net.clone());
            let q1 = Some(ModuleSlot::new(
                Q1,
                q1_net,
                "Q1_adam_opt",
                &config.value_lr_schedule,
            ));

            let (q2, q2_target) = if config.double_q {
                let q2_net = critic_config.init(device);
                let q2_target = Some(q2_net.clone());
                (
                    Some(ModuleSlot::new(
                        Q2,
                        q2_net,
                        "Q2_adam_opt",
                        &config.value_lr_schedule,
                    )),
                    q2_target,
                )
            } else {
                (None, None)
            };

            let policy_target = config.target.then(|| policy.module.clone());

            let alpha = match config.alpha {
                AlphaMode::Auto(initial) => Some(ModuleSlot::new(
                    ALPHA,
                    AlphaCoeff::new(initial, device),
                    "alpha_adam_opt",
                    &config.alpha_lr_schedule,
                )),
                AlphaMode::Fixed(_) => None,
            };

            (q1, q2, alpha, policy_target, q1_target, q2_target)
        };

        let delay_gate = DelayGate::new(config.delay_update);

        let core = Self {
            delay_gate,
            device: device.clone(),
            policy,
            q1,
            q2,
            alpha,
            policy_target,
            q1_target,
            q2_target,
            config,
        };
        log::info!(
            "parameter group created: modules={:?} targets={:?}",
            core.trainable_module_names(),
            core.target_module_names()
        );
        Ok(core)
    }

    fn require<'a, M>(slot: &'a Option<M>, name: &str) -> &'a M {
        slot.as_ref()
            .unwrap_or_else(|| panic!("module '{}' does not exist in this parameter group", name))
    }

    fn q_forward(critic: &MlpNet<B>, obs: Tensor<B, 2>, act: Tensor<B, 2>) -> Tensor<B, 1> {
        critic.forward(Tensor::cat(vec![obs, act], 1)).flatten(0, 1)
    }

    /// Action and log probability from the live policy.
    ///
    /// In deterministic mode the action is the raw distribution mean and the
    /// log probability is zero.
    pub fn compute_action(&self, obs: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 1>) {
        let logits = self.policy.module.forward(obs);
        logits_to_action(logits, self.config.deterministic_policy)
    }

    /// Action and log probability from the target policy.
    ///
    /// # Panics
    ///
    /// Panics if the group has no target networks.
    pub fn compute_target_action(&self, obs: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 1>) {
        let target = Self::require(&self.policy_target, POLICY_TARGET);
        let logits = target.forward(obs);
        logits_to_action(logits, self.config.deterministic_policy)
    }

    /// Q1 value for `(obs, act)` pairs, shape `[batch]`.
    pub fn compute_q1(&self, obs: Tensor<B, 2>, act: Tensor<B, 2>) -> Tensor<B, 1> {
        Self::q_forward(&Self::require(&self.q1, Q1).module, obs, act)
    }

    /// Q2 value for `(obs, act)` pairs.
    ///
    /// # Panics
    ///
    /// Panics unless twin critics are enabled.
    pub fn compute_q2(&self, obs: Tensor<B, 2>, act: Tensor<B, 2>) -> Tensor<B, 1> {
        Self::q_forward(&Self::require(&self.q2, Q2).module, obs, act)
    }

    /// Target-critic Q1 value.
    pub fn compute_q1_target(&self, obs: Tensor<B, 2>, act: Tensor<B, 2>) -> Tensor<B, 1> {
        Self::q_forward(Self::require(&self.q1_target, Q1_TARGET), obs, act)
    }

    /// Target-critic Q2 value.
    pub fn compute_q2_target(&self, obs: Tensor<B, 2>, act: Tensor<B, 2>) -> Tensor<B, 1> {
        Self::q_forward(Self::require(&self.q2_target, Q2_TARGET), obs, act)
    }

    /// The learnable `log(alpha)` tensor.
    ///
    /// # Panics
    ///
    /// Panics unless the entropy coefficient is learned.
    pub fn log_alpha(&self) -> Tensor<B, 1> {
        Self::require(&self.alpha, ALPHA).module.log_alpha()
    }

    /// Trainable module names in the fixed update order.
    pub fn trainable_module_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.q1.is_some() {
            names.push(Q1);
        }
        if self.q2.is_some() {
            names.push(Q2);
        }
        names.push(POLICY);
        if self.alpha.is_some() {
            names.push(ALPHA);
        }
        names
    }

    /// Target module names, ordered to follow the trainables.
    pub fn target_module_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.q1_target.is_some() {
            names.push(Q1_TARGET);
        }
        if self.q2_target.is_some() {
            names.push(Q2_TARGET);
        }
        if self.policy_target.is_some() {
            names.push(POLICY_TARGET);
        }
        names
    }

    /// Optimizer names, aligned 1:1 with [`trainable_module_names`](Self::trainable_module_names).
    pub fn optimizer_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(q1) = &self.q1 {
            names.push(q1.optimizer.name().to_string());
        }
        if let Some(q2) = &self.q2 {
            names.push(q2.optimizer.name().to_string());
        }
        names.push(self.policy.optimizer.name().to_string());
        if let Some(alpha) = &self.alpha {
            names.push(alpha.optimizer.name().to_string());
        }
        names
    }

    /// Per-optimizer schedule step counts, in optimizer order.
    pub fn optimizer_steps(&self) -> Vec<(String, usize)> {
        let mut steps = Vec::new();
        if let Some(q1) = &self.q1 {
            steps.push((q1.optimizer.name().to_string(), q1.optimizer.steps()));
        }
        if let Some(q2) = &self.q2 {
            steps.push((q2.optimizer.name().to_string(), q2.optimizer.steps()));
        }
        steps.push((
            self.policy.optimizer.name().to_string(),
            self.policy.optimizer.steps(),
        ));
        if let Some(alpha) = &self.alpha {
            steps.push((alpha.optimizer.name().to_string(), alpha.optimizer.steps()));
        }
        steps
    }

    /// Number of flattened gradient tensors each trainable module expects,
    /// in the fixed update order.
    pub fn gradient_layout(&self) -> Vec<(String, usize)> {
        let mut layout = Vec::new();
        if let Some(q1) = &self.q1 {
            layout.push((Q1.to_string(), param_count(&q1.module)));
        }
        if let Some(q2) = &self.q2 {
            layout.push((Q2.to_string(), param_count(&q2.module)));
        }
        layout.push((POLICY.to_string(), param_count(&self.policy.module)));
        if let Some(alpha) = &self.alpha {
            layout.push((ALPHA.to_string(), param_count(&alpha.module)));
        }
        layout
    }

    /// Snapshot every module's parameters: trainables in update order, then
    /// targets. Each inner vec holds one module's flattened tensors.
    pub fn get_weights(&self) -> Vec<Vec<Tensor<B, 1>>> {
        let mut groups = Vec::new();
        if let Some(q1) = &self.q1 {
            groups.push(flatten_params(&q1.module));
        }
        if let Some(q2) = &self.q2 {
            groups.push(flatten_params(&q2.module));
        }
        groups.push(flatten_params(&self.policy.module));
        if let Some(alpha) = &self.alpha {
            groups.push(flatten_params(&alpha.module));
        }
        if let Some(q1_target) = &self.q1_target {
            groups.push(flatten_params(q1_target));
        }
        if let Some(q2_target) = &self.q2_target {
            groups.push(flatten_params(q2_target));
        }
        if let Some(policy_target) = &self.policy_target {
            groups.push(flatten_params(policy_target));
        }
        groups
    }

    /// Trainable parameters only, flattened across modules in update order.
    pub fn trainable_weights(&self) -> Vec<Tensor<B, 1>> {
        let mut out = Vec::new();
        if let Some(q1) = &self.q1 {
            out.extend(flatten_params(&q1.module));
        }
        if let Some(q2) = &self.q2 {
            out.extend(flatten_params(&q2.module));
        }
        out.extend(flatten_params(&self.policy.module));
        if let Some(alpha) = &self.alpha {
            out.extend(flatten_params(&alpha.module));
        }
        out
    }

    /// Overwrite every module from a [`get_weights`](Self::get_weights)
    /// snapshot, by position.
    ///
    /// # Panics
    ///
    /// Panics if the group count, any tensor count, or any tensor length does
    /// not match this group's topology.
    pub fn set_weights(&mut self, weights: Vec<Vec<Tensor<B, 1>>>) {
        let expected = self.get_weights().len();
        assert!(
            weights.len() == expected,
            "weight snapshot has {} module groups, parameter group expects {}",
            weights.len(),
            expected
        );
        let mut groups = weights.into_iter();

        if let Some(q1) = &mut self.q1 {
            q1.module = inject_params(q1.module.clone(), &groups.next().unwrap());
        }
        if let Some(q2) = &mut self.q2 {
            q2.module = inject_params(q2.module.clone(), &groups.next().unwrap());
        }
        self.policy.module = inject_params(self.policy.module.clone(), &groups.next().unwrap());
        if let Some(alpha) = &mut self.alpha {
            alpha.module = inject_params(alpha.module.clone(), &groups.next().unwrap());
        }
        if let Some(q1_target) = self.q1_target.take() {
            self.q1_target = Some(inject_params(q1_target, &groups.next().unwrap()));
        }
        if let Some(q2_target) = self.q2_target.take() {
            self.q2_target = Some(inject_params(q2_target, &groups.next().unwrap()));
        }
        if let Some(policy_target) = self.policy_target.take() {
            self.policy_target = Some(inject_params(policy_target, &groups.next().unwrap()));
        }
    }
}
