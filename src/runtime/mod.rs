//! Abstract tensor-runtime contract. The post-processing core never talks
//! to a concrete inference backend directly; it goes through this trait.
//!
//! Two implementations ship: [`ort_backend::OrtRuntime`] (production,
//! backed by the `ort` crate) and [`mock::MockRuntime`] (test-only).

pub mod mock;
pub mod ort_backend;

use ndarray::{ArrayD, ArrayViewD};

use crate::error::RuntimeError;

/// GPU configuration options a tensor runtime may honor.
#[derive(Debug, Clone, Default)]
pub struct GpuConfig {
    pub use_gpu: bool,
    pub device_id: i32,
    pub memory_limit_bytes: Option<u64>,
    pub arena_extend_strategy: ArenaExtendStrategy,
    pub cudnn_conv_algo_search: CudnnConvAlgoSearch,
    pub copy_in_default_stream: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArenaExtendStrategy {
    #[default]
    NextPowerOfTwo,
    SameAsRequested,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CudnnConvAlgoSearch {
    #[default]
    Exhaustive,
    Heuristic,
    Default,
}

/// The declared input/output tensor shape a loaded model expects.
#[derive(Debug, Clone)]
pub struct TensorSpec {
    pub name: String,
    pub dims: [i64; 4],
}

#[derive(Debug, Clone)]
pub struct IoSpec {
    pub input: TensorSpec,
    pub output: TensorSpec,
}

/// A loaded, runnable model session. Dropping it is the idempotent
/// `Destroy` the external contract requires.
pub trait TensorSession: Send + Sync {
    fn io(&self) -> IoSpec;
    fn run(&self, input: ArrayViewD<f32>) -> Result<ArrayD<f32>, RuntimeError>;
}

/// The external collaborator that loads models and hands back sessions.
pub trait TensorRuntime: Send + Sync {
    fn load_model(
        &self,
        path: &str,
        gpu_config: &GpuConfig,
        num_threads: usize,
    ) -> Result<Box<dyn TensorSession>, RuntimeError>;
}
