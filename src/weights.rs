//! Parameter flattening and restoration.
//!
//! Modules are snapshotted as ordered lists of 1D tensors, one per parameter
//! in traversal order. Traversal order is deterministic for a fixed
//! architecture, so snapshots taken from one module can be injected into any
//! independently created module of the same shape. Flattening to 1D sidesteps
//! const generic dimension issues when storing mixed-rank parameters in one
//! collection.

use burn::module::{Module, ModuleMapper, Param};
use burn::optim::GradientsParams;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

/// Collects every float parameter of a module, flattened to 1D.
struct ParamCollector<B: Backend> {
    params: Vec<Tensor<B, 1>>,
}

impl<B: Backend> ModuleMapper<B> for ParamCollector<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let val = param.val();
        let numel: usize = val.dims().iter().product();
        self.params.push(val.reshape([numel]));
        param
    }
}

/// Snapshot a module's parameters as flattened 1D tensors in traversal order.
pub(crate) fn flatten_params<B: Backend, M: Module<B>>(module: &M) -> Vec<Tensor<B, 1>> {
    let mut collector = ParamCollector { params: Vec::new() };
    let _ = module.clone().map(&mut collector);
    collector.params
}

/// Overwrites parameters positionally from a flattened snapshot.
struct ParamInjector<'a, B: Backend> {
    values: &'a [Tensor<B, 1>],
    index: usize,
}

impl<'a, B: Backend> ModuleMapper<B> for ParamInjector<'a, B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let shape = param.val().dims();
        let numel: usize = shape.iter().product();

        let idx = self.index;
        self.index += 1;
        let value = self
            .values
            .get(idx)
            .unwrap_or_else(|| panic!("weight snapshot too short: no tensor at position {}", idx));
        let value_len = value.dims()[0];
        assert!(
            value_len == numel,
            "weight snapshot tensor {} has {} elements, parameter expects {}",
            idx,
            value_len,
            numel
        );

        Param::initialized(param.id.clone(), value.clone().reshape(shape))
    }
}

/// Replace a module's parameters with a flattened snapshot, by position.
///
/// # Panics
///
/// Panics if the snapshot's tensor count or any tensor's element count does
/// not match the module.
pub(crate) fn inject_params<B: Backend, M: Module<B>>(module: M, values: &[Tensor<B, 1>]) -> M {
    let mut injector = ParamInjector { values, index: 0 };
    let mapped = module.map(&mut injector);
    assert!(
        injector.index == values.len(),
        "weight snapshot has {} tensors, module has {} parameters",
        values.len(),
        injector.index
    );
    mapped
}

/// Registers externally computed gradients against a module's parameter ids.
struct GradientBinder<'a, B: AutodiffBackend> {
    grads: GradientsParams,
    values: &'a [Tensor<B::InnerBackend, 1>],
    index: usize,
}

impl<'a, B: AutodiffBackend> ModuleMapper<B> for GradientBinder<'a, B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let shape = param.val().dims();
        let numel: usize = shape.iter().product();

        let idx = self.index;
        self.index += 1;
        let grad = self.values.get(idx).unwrap_or_else(|| {
            panic!("gradient group too short: no tensor at position {}", idx)
        });
        let grad_len = grad.dims()[0];
        assert!(
            grad_len == numel,
            "gradient tensor {} has {} elements, parameter expects {}",
            idx,
            grad_len,
            numel
        );

        self.grads
            .register::<B::InnerBackend, D>(param.id.clone(), grad.clone().reshape(shape));
        param
    }
}

/// Build a [`GradientsParams`] for a module from flattened gradient tensors
/// in traversal order.
///
/// # Panics
///
/// Panics if the gradient count or any tensor's element count does not match
/// the module's parameters.
pub(crate) fn bind_gradients<B: AutodiffBackend, M: Module<B>>(
    module: &M,
    values: &[Tensor<B::InnerBackend, 1>],
) -> GradientsParams {
    let mut binder = GradientBinder::<B> {
        grads: GradientsParams::new(),
        values,
        index: 0,
    };
    let _ = module.clone().map(&mut binder);
    assert!(
        binder.index == values.len(),
        "gradient group has {} tensors, module has {} parameters",
        values.len(),
        binder.index
    );
    binder.grads
}

/// Number of float parameters a module exposes in traversal order.
pub(crate) fn param_count<B: Backend, M: Module<B>>(module: &M) -> usize {
    flatten_params(module).len()
}
