//! Test-only [`TensorRuntime`] that returns a caller-supplied probability
//! map instead of running a real model.

use std::sync::Mutex;

use ndarray::{ArrayD, ArrayViewD, IxDyn};

use crate::error::RuntimeError;

use super::{GpuConfig, IoSpec, TensorRuntime, TensorSession, TensorSpec};

/// Returns a fixed output tensor (or a per-call sequence of them,
/// consumed in order) regardless of the input it is given.
pub struct MockRuntime {
    outputs: Mutex<Vec<ArrayD<f32>>>,
    fail_after: Option<usize>,
}

impl MockRuntime {
    /// A runtime whose every session returns `output` for every call.
    pub fn constant(output: ArrayD<f32>) -> Self {
        Self {
            outputs: Mutex::new(vec![output]),
            fail_after: None,
        }
    }

    /// A runtime whose session cycles through `outputs` in order, then
    /// repeats the last one.
    pub fn sequence(outputs: Vec<ArrayD<f32>>) -> Self {
        Self {
            outputs: Mutex::new(outputs),
            fail_after: None,
        }
    }

    /// A runtime whose `load_model` fails, for exercising error paths.
    pub fn failing() -> Self {
        Self {
            outputs: Mutex::new(Vec::new()),
            fail_after: Some(0),
        }
    }
}

impl TensorRuntime for MockRuntime {
    fn load_model(
        &self,
        _path: &str,
        _gpu_config: &GpuConfig,
        _num_threads: usize,
    ) -> Result<Box<dyn TensorSession>, RuntimeError> {
        if self.fail_after == Some(0) {
            return Err(RuntimeError::ModelLoad("mock runtime configured to fail".into()));
        }
        let outputs = self.outputs.lock().unwrap().clone();
        Ok(Box::new(MockSession {
            outputs: Mutex::new(outputs),
            cursor: Mutex::new(0),
        }))
    }
}

struct MockSession {
    outputs: Mutex<Vec<ArrayD<f32>>>,
    cursor: Mutex<usize>,
}

impl TensorSession for MockSession {
    fn io(&self) -> IoSpec {
        IoSpec {
            input: TensorSpec {
                name: "input".to_string(),
                dims: [1, 3, -1, -1],
            },
            output: TensorSpec {
                name: "output".to_string(),
                dims: [1, 1, -1, -1],
            },
        }
    }

    fn run(&self, _input: ArrayViewD<f32>) -> Result<ArrayD<f32>, RuntimeError> {
        let outputs = self.outputs.lock().unwrap();
        if outputs.is_empty() {
            return Err(RuntimeError::Inference("mock runtime has no configured output".into()));
        }
        let mut cursor = self.cursor.lock().unwrap();
        let idx = (*cursor).min(outputs.len() - 1);
        *cursor += 1;
        Ok(outputs[idx].clone())
    }
}

/// Build a `[1,1,H,W]` mock output tensor from a flat row-major probability map.
pub fn map_to_output(prob: &[f32], width: usize, height: usize) -> ArrayD<f32> {
    ArrayD::from_shape_vec(IxDyn(&[1, 1, height, width]), prob.to_vec()).expect("shape matches buffer length")
}
