//! Agent configuration.
//!
//! [`AgentConfig`] describes the full parameter-group topology: which networks
//! exist, how the policy samples actions, the soft-update rate, the delayed
//! update period, and one learning-rate schedule per optimizer family.
//!
//! Invalid flag combinations are rejected at construction time with a
//! [`ConfigError`]; they are never silently downgraded into a different
//! topology.

use serde::{Deserialize, Serialize};

/// Activation function applied inside [`crate::nn::mlp::MlpNet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    /// Identity (no activation).
    Linear,
    Relu,
    Tanh,
    Gelu,
}

/// Entropy-coefficient mode.
///
/// The coefficient weights the policy's entropy bonus. `Fixed` keeps it
/// constant; `Auto` creates a dedicated scalar module holding `log(alpha)`
/// plus its own optimizer, updated on delayed steps only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AlphaMode {
    /// Constant coefficient; no module, no optimizer.
    Fixed(f32),
    /// Learned coefficient, starting from the given initial value.
    Auto(f32),
}

impl AlphaMode {
    /// Whether this mode creates a learnable module.
    pub fn is_auto(&self) -> bool {
        matches!(self, AlphaMode::Auto(_))
    }

    fn value(&self) -> f32 {
        match self {
            AlphaMode::Fixed(v) | AlphaMode::Auto(v) => *v,
        }
    }
}

/// Polynomial-decay learning-rate schedule descriptor.
///
/// `lr(step) = end_lr + (initial_lr - end_lr) * (1 - step/decay_steps)^power`,
/// clamped at `end_lr` once `decay_steps` is reached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LrSchedule {
    pub initial_lr: f64,
    pub decay_steps: usize,
    pub end_lr: f64,
    pub power: f64,
}

impl LrSchedule {
    pub fn new(initial_lr: f64, decay_steps: usize, end_lr: f64, power: f64) -> Self {
        Self {
            initial_lr,
            decay_steps,
            end_lr,
            power,
        }
    }

    fn is_valid(&self) -> bool {
        self.initial_lr.is_finite()
            && self.end_lr.is_finite()
            && self.initial_lr >= 0.0
            && self.end_lr >= 0.0
            && self.power.is_finite()
            && self.power > 0.0
            && self.decay_steps > 0
    }
}

impl Default for LrSchedule {
    fn default() -> Self {
        Self::new(3e-4, 100_000, 1e-5, 1.0)
    }
}

/// Immutable description of the agent's parameter-group topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Number of hidden layers in every network.
    pub num_hidden_layers: usize,
    /// Width of every hidden layer.
    pub num_hidden_units: usize,
    /// Activation used between hidden layers.
    pub hidden_activation: Activation,
    /// Activation applied to the policy network's raw output.
    pub policy_out_activation: Activation,
    /// Only a policy (and its optimizer) exists; no critics, no targets.
    pub policy_only: bool,
    /// Twin critics (clipped double-Q). Requires `target`.
    pub double_q: bool,
    /// Maintain slowly-tracking target copies of the critics and policy.
    pub target: bool,
    /// Entropy-coefficient mode.
    pub alpha: AlphaMode,
    /// Deterministic policy: actions are the raw distribution mean.
    pub deterministic_policy: bool,
    /// Soft-update rate, in (0, 1].
    pub tau: f32,
    /// Policy/target/alpha updates fire once per this many gradient calls.
    pub delay_update: u64,
    pub policy_lr_schedule: LrSchedule,
    pub value_lr_schedule: LrSchedule,
    pub alpha_lr_schedule: LrSchedule,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            num_hidden_layers: 2,
            num_hidden_units: 64,
            hidden_activation: Activation::Gelu,
            policy_out_activation: Activation::Linear,
            policy_only: false,
            double_q: true,
            target: true,
            alpha: AlphaMode::Fixed(0.2),
            deterministic_policy: false,
            tau: 0.005,
            delay_update: 2,
            policy_lr_schedule: LrSchedule::default(),
            value_lr_schedule: LrSchedule::default(),
            alpha_lr_schedule: LrSchedule::default(),
        }
    }
}

impl AgentConfig {
    pub fn with_hidden_layers(mut self, layers: usize, units: usize) -> Self {
        self.num_hidden_layers = layers;
        self.num_hidden_units = units;
        self
    }

    pub fn with_policy_only(mut self, policy_only: bool) -> Self {
        self.policy_only = policy_only;
        self
    }

    pub fn with_double_q(mut self, double_q: bool) -> Self {
        self.double_q = double_q;
        self
    }

    pub fn with_target(mut self, target: bool) -> Self {
        self.target = target;
        self
    }

    pub fn with_alpha(mut self, alpha: AlphaMode) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_deterministic_policy(mut self, deterministic: bool) -> Self {
        self.deterministic_policy = deterministic;
        self
    }

    pub fn with_tau(mut self, tau: f32) -> Self {
        self.tau = tau;
        self
    }

    pub fn with_delay_update(mut self, delay_update: u64) -> Self {
        self.delay_update = delay_update;
        self
    }

    pub fn with_policy_out_activation(mut self, activation: Activation) -> Self {
        self.policy_out_activation = activation;
        self
    }

    /// Validate the flag combination and numeric ranges.
    ///
    /// Called by [`crate::agent::ActorCriticCore::new`]; exposed so callers can
    /// check a configuration before building networks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.double_q && !self.target {
            return Err(ConfigError::DoubleQWithoutTarget);
        }
        if !(self.tau > 0.0 && self.tau <= 1.0) || !self.tau.is_finite() {
            return Err(ConfigError::InvalidTau(self.tau));
        }
        if self.delay_update == 0 {
            return Err(ConfigError::InvalidDelay);
        }
        let alpha_value = self.alpha.value();
        if !(alpha_value > 0.0) || !alpha_value.is_finite() {
            return Err(ConfigError::InvalidAlpha(alpha_value));
        }
        for schedule in [
            &self.policy_lr_schedule,
            &self.value_lr_schedule,
            &self.alpha_lr_schedule,
        ] {
            if !schedule.is_valid() {
                return Err(ConfigError::InvalidSchedule(*schedule));
            }
        }
        Ok(())
    }
}

/// Fatal configuration errors, raised at construction and never downgraded.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `double_q` requires `target`: twin critics regress against target copies.
    DoubleQWithoutTarget,
    /// Soft-update rate outside (0, 1].
    InvalidTau(f32),
    /// The delayed-update period must be a positive integer.
    InvalidDelay,
    /// The entropy coefficient (fixed or initial) must be positive and finite.
    InvalidAlpha(f32),
    /// A learning-rate schedule descriptor is out of range.
    InvalidSchedule(LrSchedule),
    /// Observation/action dimensions must be positive.
    InvalidDimension { obs_dim: usize, act_dim: usize },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::DoubleQWithoutTarget => {
                write!(f, "double_q=true requires target=true")
            }
            ConfigError::InvalidTau(tau) => {
                write!(f, "tau must be in (0, 1], got {}", tau)
            }
            ConfigError::InvalidDelay => {
                write!(f, "delay_update must be a positive integer")
            }
            ConfigError::InvalidAlpha(v) => {
                write!(f, "entropy coefficient must be positive and finite, got {}", v)
            }
            ConfigError::InvalidSchedule(s) => {
                write!(f, "invalid learning-rate schedule: {:?}", s)
            }
            ConfigError::InvalidDimension { obs_dim, act_dim } => {
                write!(
                    f,
                    "observation and action dimensions must be positive, got obs_dim={} act_dim={}",
                    obs_dim, act_dim
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}
