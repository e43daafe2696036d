//! Cancellation handle: a cheap, cloneable signal checked at call
//! boundaries (before submitting to the tensor runtime, once on return).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{OcrError, OcrResult};

/// A scoped cancellation/deadline signal passed through inference calls.
#[derive(Clone)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// A signal that never cancels.
    pub fn none() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// A signal with a fixed deadline; `is_cancelled` becomes true once
    /// `Instant::now()` passes it.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// Trip the flag. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::SeqCst) {
            return true;
        }
        matches!(self.deadline, Some(d) if Instant::now() >= d)
    }

    /// Check the signal at a call boundary; returns `Err(Cancelled)` if tripped.
    pub fn check(&self) -> OcrResult<()> {
        if self.is_cancelled() {
            Err(OcrError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::none()
    }
}
