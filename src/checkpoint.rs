//! Whole-group checkpointing, keyed by training iteration.
//!
//! A checkpoint is the directory `{dir}/ckpt_ite{iteration}` holding one Burn
//! binary record per live module, target copy, and optimizer, each under its
//! stable name (`policy`, `Q1`, `Q1_target`, `policy_adam_opt`, ...), plus a
//! `manifest.json` recording the iteration, the exact name sets, each
//! optimizer's schedule step count, and the delayed-update phase.
//!
//! Restore is strictly by name: the manifest is read first and its name sets
//! must match the loading group's topology exactly, otherwise loading fails
//! before any record is touched. A successful round trip restores module
//! weights, Adam moment state, schedule steps, and the delay schedule's
//! phase, so training resumes without a discontinuity.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::agent::{
    ActorCriticCore, ALPHA, POLICY, POLICY_TARGET, Q1, Q1_TARGET, Q2, Q2_TARGET,
};

const MANIFEST_FILE: &str = "manifest.json";
const CKPT_PREFIX: &str = "ckpt_ite";

/// Error type for checkpoint operations.
#[derive(Debug)]
pub enum CheckpointError {
    /// IO error during save/load.
    Io(io::Error),
    /// Burn recorder error.
    Recorder(String),
    /// Missing or malformed manifest.
    Manifest(String),
    /// The checkpoint's name sets do not match the loading group's topology.
    NameMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

impl std::fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointError::Io(e) => write!(f, "IO error: {}", e),
            CheckpointError::Recorder(e) => write!(f, "Recorder error: {}", e),
            CheckpointError::Manifest(e) => write!(f, "Manifest error: {}", e),
            CheckpointError::NameMismatch { expected, found } => write!(
                f,
                "checkpoint names do not match parameter group: expected {:?}, found {:?}",
                expected, found
            ),
        }
    }
}

impl std::error::Error for CheckpointError {}

impl From<io::Error> for CheckpointError {
    fn from(e: io::Error) -> Self {
        CheckpointError::Io(e)
    }
}

/// Per-optimizer manifest entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OptimizerEntry {
    name: String,
    schedule_steps: usize,
}

/// Checkpoint metadata, stored as `manifest.json` next to the records.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CheckpointManifest {
    iteration: u64,
    delay_phase: u64,
    modules: Vec<String>,
    targets: Vec<String>,
    optimizers: Vec<OptimizerEntry>,
}

impl<B: AutodiffBackend> ActorCriticCore<B> {
    fn manifest(&self, iteration: u64) -> CheckpointManifest {
        CheckpointManifest {
            iteration,
            delay_phase: self.delay_gate.phase(),
            modules: self
                .trainable_module_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            targets: self
                .target_module_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            optimizers: self
                .optimizer_steps()
                .into_iter()
                .map(|(name, schedule_steps)| OptimizerEntry {
                    name,
                    schedule_steps,
                })
                .collect(),
        }
    }

    /// Save the whole group under `{dir}/ckpt_ite{iteration}`.
    ///
    /// Returns the checkpoint directory path.
    pub fn save_weights(&self, dir: &Path, iteration: u64) -> Result<PathBuf, CheckpointError> {
        let ckpt_dir = dir.join(format!("{}{}", CKPT_PREFIX, iteration));
        fs::create_dir_all(&ckpt_dir)?;
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();

        self.policy
            .module
            .clone()
            .save_file(ckpt_dir.join(POLICY), &recorder)
            .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
        if let Some(q1) = &self.q1 {
            q1.module
                .clone()
                .save_file(ckpt_dir.join(Q1), &recorder)
                .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
        }
        if let Some(q2) = &self.q2 {
            q2.module
                .clone()
                .save_file(ckpt_dir.join(Q2), &recorder)
                .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
        }
        if let Some(alpha) = &self.alpha {
            alpha
                .module
                .clone()
                .save_file(ckpt_dir.join(ALPHA), &recorder)
                .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
        }
        if let Some(target) = &self.q1_target {
            target
                .clone()
                .save_file(ckpt_dir.join(Q1_TARGET), &recorder)
                .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
        }
        if let Some(target) = &self.q2_target {
            target
                .clone()
                .save_file(ckpt_dir.join(Q2_TARGET), &recorder)
                .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
        }
        if let Some(target) = &self.policy_target {
            target
                .clone()
                .save_file(ckpt_dir.join(POLICY_TARGET), &recorder)
                .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
        }

        self.policy
            .optimizer
            .save_state(&ckpt_dir.join(self.policy.optimizer.name()))
            .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
        if let Some(q1) = &self.q1 {
            q1.optimizer
                .save_state(&ckpt_dir.join(q1.optimizer.name()))
                .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
        }
        if let Some(q2) = &self.q2 {
            q2.optimizer
                .save_state(&ckpt_dir.join(q2.optimizer.name()))
                .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
        }
        if let Some(alpha) = &self.alpha {
            alpha
                .optimizer
                .save_state(&ckpt_dir.join(alpha.optimizer.name()))
                .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
        }

        let manifest = self.manifest(iteration);
        let json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| CheckpointError::Manifest(e.to_string()))?;
        fs::write(ckpt_dir.join(MANIFEST_FILE), json)?;

        log::info!(
            "saved checkpoint at iteration {} to {}",
            iteration,
            ckpt_dir.display()
        );
        Ok(ckpt_dir)
    }

    /// Restore the whole group from `{dir}/ckpt_ite{iteration}`.
    ///
    /// The manifest's name sets must match this group's topology exactly;
    /// on mismatch no record is read and the group is left untouched.
    pub fn load_weights(&mut self, dir: &Path, iteration: u64) -> Result<(), CheckpointError> {
        let ckpt_dir = dir.join(format!("{}{}", CKPT_PREFIX, iteration));

        let json = fs::read_to_string(ckpt_dir.join(MANIFEST_FILE))?;
        let manifest: CheckpointManifest =
            serde_json::from_str(&json).map_err(|e| CheckpointError::Manifest(e.to_string()))?;
        if manifest.iteration != iteration {
            return Err(CheckpointError::Manifest(format!(
                "manifest iteration {} does not match requested iteration {}",
                manifest.iteration, iteration
            )));
        }

        let expected = self.sorted_name_set(iteration);
        let mut found: Vec<String> = manifest
            .modules
            .iter()
            .chain(manifest.targets.iter())
            .cloned()
            .chain(manifest.optimizers.iter().map(|e| e.name.clone()))
            .collect();
        found.sort_unstable();
        if expected != found {
            return Err(CheckpointError::NameMismatch { expected, found });
        }

        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        let device = self.device.clone();

        self.policy.module = self
            .policy
            .module
            .clone()
            .load_file(ckpt_dir.join(POLICY), &recorder, &device)
            .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
        if let Some(q1) = &mut self.q1 {
            q1.module = q1
                .module
                .clone()
                .load_file(ckpt_dir.join(Q1), &recorder, &device)
                .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
        }
        if let Some(q2) = &mut self.q2 {
            q2.module = q2
                .module
                .clone()
                .load_file(ckpt_dir.join(Q2), &recorder, &device)
                .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
        }
        if let Some(alpha) = &mut self.alpha {
            alpha.module = alpha
                .module
                .clone()
                .load_file(ckpt_dir.join(ALPHA), &recorder, &device)
                .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
        }
        if let Some(target) = &self.q1_target {
            self.q1_target = Some(
                target
                    .clone()
                    .load_file(ckpt_dir.join(Q1_TARGET), &recorder, &device)
                    .map_err(|e| CheckpointError::Recorder(e.to_string()))?,
            );
        }
        if let Some(target) = &self.q2_target {
            self.q2_target = Some(
                target
                    .clone()
                    .load_file(ckpt_dir.join(Q2_TARGET), &recorder, &device)
                    .map_err(|e| CheckpointError::Recorder(e.to_string()))?,
            );
        }
        if let Some(target) = &self.policy_target {
            self.policy_target = Some(
                target
                    .clone()
                    .load_file(ckpt_dir.join(POLICY_TARGET), &recorder, &device)
                    .map_err(|e| CheckpointError::Recorder(e.to_string()))?,
            );
        }

        let steps_for = |name: &str| {
            manifest
                .optimizers
                .iter()
                .find(|e| e.name == name)
                .map(|e| e.schedule_steps)
                .unwrap_or(0)
        };
        self.policy
            .optimizer
            .restore_state(&ckpt_dir.join(self.policy.optimizer.name()), &device)
            .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
        self.policy
            .optimizer
            .restore_steps(steps_for(self.policy.optimizer.name()));
        if let Some(q1) = &mut self.q1 {
            q1.optimizer
                .restore_state(&ckpt_dir.join(q1.optimizer.name()), &device)
                .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
            q1.optimizer.restore_steps(steps_for(q1.optimizer.name()));
        }
        if let Some(q2) = &mut self.q2 {
            q2.optimizer
                .restore_state(&ckpt_dir.join(q2.optimizer.name()), &device)
                .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
            q2.optimizer.restore_steps(steps_for(q2.optimizer.name()));
        }
        if let Some(alpha) = &mut self.alpha {
            alpha
                .optimizer
                .restore_state(&ckpt_dir.join(alpha.optimizer.name()), &device)
                .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
            alpha
                .optimizer
                .restore_steps(steps_for(alpha.optimizer.name()));
        }

        self.delay_gate.restore_phase(manifest.delay_phase);

        log::info!(
            "restored checkpoint at iteration {} from {}",
            iteration,
            ckpt_dir.display()
        );
        Ok(())
    }

    fn sorted_name_set(&self, iteration: u64) -> Vec<String> {
        let manifest = self.manifest(iteration);
        let mut names: Vec<String> = manifest
            .modules
            .into_iter()
            .chain(manifest.targets)
            .chain(manifest.optimizers.into_iter().map(|e| e.name))
            .collect();
        names.sort_unstable();
        names
    }
}

/// List the checkpoint iterations available under `dir`, ascending.
pub fn list_checkpoints(dir: &Path) -> Result<Vec<u64>, CheckpointError> {
    let mut iterations: Vec<u64> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            e.file_name()
                .to_str()?
                .strip_prefix(CKPT_PREFIX)?
                .parse()
                .ok()
        })
        .collect();
    iterations.sort_unstable();
    Ok(iterations)
}
