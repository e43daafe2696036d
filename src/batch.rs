//! Batched inference façade: uniform-shape batch assembly, runtime
//! submission, output splitting, and per-image rescaling.

use ndarray::{Array4, ArrayD, Axis};

use crate::error::{OcrError, OcrResult};
use crate::pool::{get_f32, Pooled};
use crate::runtime::TensorSession;

/// A single preprocessed image ready for batching: channel-first `[3,H,W]`
/// normalized data plus its shape.
pub struct PreparedImage {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
}

/// Per-image probability map split out of a batched runtime output.
pub struct BatchOutput {
    pub prob: Pooled<f32>,
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchStats {
    pub images: usize,
    pub elapsed_secs: f64,
    pub throughput_images_per_sec: f64,
    pub approx_memory_delta_bytes: i64,
}

/// Assemble a contiguous `[N,3,H,W]` batch tensor from same-shaped
/// prepared images. `ShapeMismatch` if shapes diverge.
pub fn assemble_batch(images: &[PreparedImage]) -> OcrResult<Array4<f32>> {
    if images.is_empty() {
        return Ok(Array4::<f32>::zeros((0, 3, 0, 0)));
    }

    let (w0, h0) = (images[0].width, images[0].height);
    for img in images {
        if img.width != w0 || img.height != h0 {
            return Err(OcrError::ShapeMismatch {
                expected: vec![w0, h0],
                got: vec![img.width, img.height],
            });
        }
    }

    let mut batch = Array4::<f32>::zeros((images.len(), 3, h0, w0));
    for (i, img) in images.iter().enumerate() {
        let plane = w0 * h0;
        for c in 0..3 {
            for y in 0..h0 {
                for x in 0..w0 {
                    batch[[i, c, y, x]] = img.data[c * plane + y * w0 + x];
                }
            }
        }
    }

    Ok(batch)
}

/// Submit an assembled batch to `session`, then split the `[N,1,Hout,Wout]`
/// output into per-image pooled probability maps.
pub fn run_batch(session: &dyn TensorSession, batch: Array4<f32>) -> OcrResult<Vec<BatchOutput>> {
    let n = batch.shape()[0];
    let output: ArrayD<f32> = session
        .run(batch.into_dyn().view())
        .map_err(OcrError::RuntimeFailure)?;

    if output.shape()[0] != n {
        return Err(OcrError::ShapeMismatch {
            expected: vec![n],
            got: vec![output.shape()[0]],
        });
    }

    let h_out = output.shape()[2];
    let w_out = output.shape()[3];

    let mut results = Vec::with_capacity(n);
    for i in 0..n {
        let slice = output.index_axis(Axis(0), i);
        let mut prob = get_f32(w_out * h_out);
        for (dst, &src) in prob.iter_mut().zip(slice.iter()) {
            *dst = src;
        }
        results.push(BatchOutput {
            prob,
            width: w_out,
            height: h_out,
        });
    }

    Ok(results)
}

/// Degenerate single-image inference, skipping the batch-assembly path.
pub fn run_single(session: &dyn TensorSession, image: PreparedImage) -> OcrResult<BatchOutput> {
    let batch = Array4::from_shape_vec((1, 3, image.height, image.width), image.data)
        .map_err(|_| OcrError::InvalidInput("image data length does not match its declared shape".into()))?;
    let mut outputs = run_batch(session, batch)?;
    Ok(outputs.remove(0))
}

/// Approximate throughput/memory-delta stats for a completed batch run.
pub fn compute_batch_stats(images: usize, elapsed_secs: f64, bytes_before: usize, bytes_after: usize) -> BatchStats {
    BatchStats {
        images,
        elapsed_secs,
        throughput_images_per_sec: if elapsed_secs > 0.0 { images as f64 / elapsed_secs } else { 0.0 },
        approx_memory_delta_bytes: bytes_after as i64 - bytes_before as i64,
    }
}
