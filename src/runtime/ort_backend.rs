//! Production [`TensorRuntime`] backed by the `ort` crate (ONNX Runtime).

use std::sync::Mutex;

use ndarray::{ArrayD, ArrayViewD, IxDyn};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;

use crate::error::RuntimeError;

use super::{GpuConfig, IoSpec, TensorRuntime, TensorSession, TensorSpec};

/// The `ort`-backed production runtime. Stateless beyond its own
/// environment initialization, which `ort` handles internally.
pub struct OrtRuntime;

impl OrtRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OrtRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl TensorRuntime for OrtRuntime {
    fn load_model(
        &self,
        path: &str,
        gpu_config: &GpuConfig,
        num_threads: usize,
    ) -> Result<Box<dyn TensorSession>, RuntimeError> {
        let mut builder = Session::builder()
            .map_err(|e| RuntimeError::ModelLoad(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| RuntimeError::ModelLoad(e.to_string()))?
            .with_intra_threads(num_threads.max(1))
            .map_err(|e| RuntimeError::ModelLoad(e.to_string()))?;

        if gpu_config.use_gpu {
            #[cfg(feature = "cuda")]
            {
                use ort::execution_providers::CUDAExecutionProvider;
                let provider = CUDAExecutionProvider::default().with_device_id(gpu_config.device_id);
                builder = builder
                    .with_execution_providers([provider.build()])
                    .map_err(|e| RuntimeError::ModelLoad(e.to_string()))?;
            }
        }

        let session = builder
            .commit_from_file(path)
            .map_err(|e| RuntimeError::ModelLoad(e.to_string()))?;

        let io = io_spec_from(&session)?;

        Ok(Box::new(OrtSession {
            session: Mutex::new(session),
            io,
        }))
    }
}

fn io_spec_from(session: &Session) -> Result<IoSpec, RuntimeError> {
    let input = session
        .inputs
        .first()
        .ok_or_else(|| RuntimeError::ModelLoad("model has no inputs".into()))?;
    let output = session
        .outputs
        .first()
        .ok_or_else(|| RuntimeError::ModelLoad("model has no outputs".into()))?;

    Ok(IoSpec {
        input: TensorSpec {
            name: input.name.clone(),
            dims: [1, 3, -1, -1],
        },
        output: TensorSpec {
            name: output.name.clone(),
            dims: [1, 1, -1, -1],
        },
    })
}

struct OrtSession {
    session: Mutex<Session>,
    io: IoSpec,
}

// SAFETY: `ort::session::Session` is safe to share across threads when
// every call takes &self and is serialized; we enforce that with the Mutex.
unsafe impl Send for OrtSession {}
unsafe impl Sync for OrtSession {}

impl TensorSession for OrtSession {
    fn io(&self) -> IoSpec {
        self.io.clone()
    }

    fn run(&self, input: ArrayViewD<f32>) -> Result<ArrayD<f32>, RuntimeError> {
        let owned = input.to_owned();
        let tensor = Tensor::from_array(owned).map_err(|e| RuntimeError::Inference(e.to_string()))?;

        let session = self.session.lock().expect("ort session mutex poisoned");
        let outputs = session
            .run(ort::inputs![self.io.input.name.as_str() => tensor])
            .map_err(|e| RuntimeError::Inference(e.to_string()))?;

        let (shape, data) = outputs[self.io.output.name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| RuntimeError::Inference(e.to_string()))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec())
            .map_err(|e| RuntimeError::Inference(format!("output reshape failed: {e}")))
    }
}
