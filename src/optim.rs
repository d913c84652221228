//! Per-module optimizer: Adam paired with a polynomial-decay schedule.
//!
//! Each trainable module owns exactly one [`ScheduledAdam`]. One `apply` is
//! one schedule step, so a module's learning rate decays with its own update
//! count rather than the global iteration counter. The Adam moment state and
//! the schedule step are both checkpointable.

use std::path::Path;

use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::record::{BinFileRecorder, FullPrecisionSettings, Recorder, RecorderError};
use burn::tensor::backend::AutodiffBackend;

use crate::config::LrSchedule;
use crate::scheduling::PolynomialDecay;

/// Adam with an owned learning-rate schedule and a stable name.
pub(crate) struct ScheduledAdam<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    name: String,
    config: AdamConfig,
    schedule: PolynomialDecay,
    inner: OptimizerAdaptor<Adam, M, B>,
}

impl<B, M> ScheduledAdam<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    pub(crate) fn new(name: impl Into<String>, schedule: &LrSchedule) -> Self {
        let config = AdamConfig::new().with_epsilon(1e-5);
        Self {
            name: name.into(),
            inner: config.init(),
            schedule: PolynomialDecay::from_schedule(schedule),
            config,
        }
    }

    /// Stable name, used as the checkpoint record key.
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Apply gradients to a module and advance the schedule by one step.
    pub(crate) fn apply(&mut self, module: M, grads: GradientsParams) -> M {
        let lr = self.schedule.step();
        self.inner.step(lr, module, grads)
    }

    /// Number of optimizer applications so far.
    pub(crate) fn steps(&self) -> usize {
        self.schedule.current_step()
    }

    /// Restore the schedule step counter from a checkpoint.
    pub(crate) fn restore_steps(&self, steps: usize) {
        self.schedule.restore_step(steps);
    }

    /// Persist the Adam moment state to `path` as a Burn binary record.
    pub(crate) fn save_state(&self, path: &Path) -> Result<(), RecorderError> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        recorder.record(self.inner.to_record(), path.to_path_buf())
    }

    /// Restore the Adam moment state from `path`.
    ///
    /// The adaptor is rebuilt from its config and the loaded record replaces
    /// any accumulated state.
    pub(crate) fn restore_state(
        &mut self,
        path: &Path,
        device: &B::Device,
    ) -> Result<(), RecorderError> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        let record: <OptimizerAdaptor<Adam, M, B> as Optimizer<M, B>>::Record =
            recorder.load(path.to_path_buf(), device)?;
        let fresh: OptimizerAdaptor<Adam, M, B> = self.config.init();
        self.inner = fresh.load_record(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::{bind_gradients, flatten_params};
    use burn::backend::{Autodiff, NdArray};
    use burn::nn::LinearConfig;
    use burn::prelude::*;

    type B = Autodiff<NdArray<f32>>;

    #[test]
    fn test_apply_moves_weights_and_counts_steps() {
        let device = Default::default();
        let module = LinearConfig::new(3, 2).init::<B>(&device);
        let before = flatten_params(&module);

        let mut opt: ScheduledAdam<B, _> = ScheduledAdam::new("test_opt", &LrSchedule::default());
        assert_eq!(opt.steps(), 0);
        assert_eq!(opt.name(), "test_opt");

        let grads: Vec<Tensor<NdArray<f32>, 1>> = vec![
            Tensor::ones([6], &device),
            Tensor::ones([2], &device),
        ];
        let grads = bind_gradients(&module, &grads);
        let module = opt.apply(module, grads);

        assert_eq!(opt.steps(), 1);
        let after = flatten_params(&module);
        let before = before[0].clone().into_data();
        let after = after[0].clone().into_data();
        assert_ne!(
            before.as_slice::<f32>().unwrap(),
            after.as_slice::<f32>().unwrap()
        );
    }

    #[test]
    fn test_restore_steps_overwrites_counter() {
        let device = Default::default();
        let _module = LinearConfig::new(3, 2).init::<B>(&device);
        let opt: ScheduledAdam<B, burn::nn::Linear<B>> =
            ScheduledAdam::new("test_opt", &LrSchedule::default());
        opt.restore_steps(42);
        assert_eq!(opt.steps(), 42);
    }
}
