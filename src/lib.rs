//! # offpolicy-core: update orchestration for off-policy actor-critic agents
//!
//! This crate implements the training-time control logic of a twin-critic,
//! delayed-policy-update, entropy-regularized actor-critic agent (the TD3/SAC
//! family). It does not compute gradients: the outer training loop differentiates
//! the losses and hands the resulting gradients back, and this crate decides
//! which optimizer each gradient group feeds, when the policy and entropy
//! coefficient are allowed to move, and when target networks are smoothed.
//!
//! ## Components
//!
//! - [`agent::ActorCriticCore`]: the parameter group. Owns the policy, up to two
//!   critics, their optional target copies, and the optional learned entropy
//!   coefficient, each paired 1:1 with an Adam optimizer on a polynomial-decay
//!   learning-rate schedule.
//! - [`distribution`]: squashed-Gaussian action sampling with the exact
//!   change-of-variables log-probability correction.
//! - [`target`]: Polyak (exponential moving average) target smoothing.
//! - [`router`]: named gradient groups and the delayed-update schedule.
//! - [`checkpoint`]: whole-group save/restore by stable module name, keyed by
//!   training iteration, including optimizer state.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use burn::backend::{Autodiff, NdArray};
//! use offpolicy_core::{ActorCriticCore, AgentConfig, AlphaMode, GradientBundle};
//!
//! type B = Autodiff<NdArray<f32>>;
//!
//! let config = AgentConfig::default().with_alpha(AlphaMode::Auto(0.2));
//! let mut core: ActorCriticCore<B> = ActorCriticCore::new(6, 2, config, &device)?;
//!
//! let (action, log_prob) = core.compute_action(obs);
//! let q = core.compute_q1(obs, action);
//! // ... outer loop computes gradients externally ...
//! core.apply_gradients(iteration, grads);
//! core.save_weights("./ckpts".as_ref(), iteration)?;
//! ```
//!
//! All operations are synchronous and single-threaded; the caller serializes
//! access to a given parameter group.

pub mod agent;
pub mod checkpoint;
pub mod config;
pub mod distribution;
pub mod nn;
pub mod router;
pub mod scheduling;
pub mod target;

pub(crate) mod optim;
pub(crate) mod weights;

pub use agent::ActorCriticCore;
pub use checkpoint::{list_checkpoints, CheckpointError};
pub use config::{Activation, AgentConfig, AlphaMode, ConfigError, LrSchedule};
pub use distribution::{log_prob_from_raw, logits_to_action, sample_squashed, split_logits};
pub use nn::alpha::AlphaCoeff;
pub use nn::mlp::{MlpNet, MlpNetConfig};
pub use router::GradientBundle;
pub use scheduling::PolynomialDecay;
pub use target::soft_update;
