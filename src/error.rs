//! Error type definitions

use thiserror::Error;

/// Error surfaced by a [`crate::runtime::TensorRuntime`] implementation.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Model loading failed.
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// The runtime rejected or failed a forward pass.
    #[error("inference failed: {0}")]
    Inference(String),

    /// Input/output tensor shape did not match what the model expects.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
}

/// Core error type.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Nil image, mismatched dimensions, or non-positive sizes.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Tensor dimensions or batch shape inconsistent (e.g. mixed shapes in a batch).
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// Inference attempted after the detector's session was shut down.
    #[error("session closed")]
    SessionClosed,

    /// Wrapped error from the external tensor runtime.
    #[error("runtime failure: {0}")]
    RuntimeFailure(#[from] RuntimeError),

    /// Inference was aborted by an external cancellation/deadline signal.
    #[error("cancelled")]
    Cancelled,

    /// Missing model path, or min > max bounds in a config.
    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    /// Image codec error.
    #[error("image error: {0}")]
    ImageError(#[from] image::ImageError),

    /// IO error reading a model file.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type OcrResult<T> = std::result::Result<T, OcrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        assert_eq!(OcrError::SessionClosed.to_string(), "session closed");
        assert_eq!(OcrError::Cancelled.to_string(), "cancelled");
        assert_eq!(
            OcrError::InvalidInput("empty map".into()).to_string(),
            "invalid input: empty map"
        );
    }

    #[test]
    fn shape_mismatch_carries_dims() {
        let err = OcrError::ShapeMismatch {
            expected: vec![1, 3, 32, 32],
            got: vec![1, 3, 64, 64],
        };
        assert!(err.to_string().contains("32"));
        assert!(err.to_string().contains("64"));
    }
}
