//! # textdet-core
//!
//! Text-detection post-processing and multi-scale orchestration for a
//! differentiable-binarization (DB) OCR pipeline. Given a per-pixel
//! probability map produced by an external segmentation model, this crate
//! extracts oriented text regions — polygon, axis-aligned box, calibrated
//! confidence — ready for a downstream recognition stage.
//!
//! ## What lives here
//!
//! - [`pool`]: size-classed `f32`/`bool` buffer pool backing every
//!   hot-path allocation.
//! - [`geometry`]: polygon simplification, convex hull, minimum-area
//!   rectangle, unclip expansion.
//! - [`preprocess`]: aspect-preserving resize and RGB normalization.
//! - [`components`]: 4-connectivity connected-component labeling.
//! - [`contour`]: Moore-Neighbor boundary tracing.
//! - [`morphology`]: dilate/erode/open/close/smooth over probability maps.
//! - [`threshold`]: Otsu/histogram/dynamic adaptive threshold selection.
//! - [`detect`]: the DB post-processor (binarize -> components -> regions).
//! - [`nms`]: hard, soft, adaptive, and size-aware non-maximum suppression.
//! - [`multiscale`]: scale-pyramid orchestration and region merging.
//! - [`batch`]: batched inference façade over the tensor-runtime trait.
//! - [`serialize`]: JSON schema, validation, visualization, reading order.
//! - [`runtime`]: the abstract tensor-runtime contract plus its `ort`-backed
//!   production implementation and test-only mock.
//! - [`detector`]: the top-level [`detector::Detector`] that wires all of
//!   the above into one callable surface.
//! - [`cancel`]: cooperative cancellation/deadline signal.
//! - [`error`]: the crate's error taxonomy.

pub mod batch;
pub mod cancel;
pub mod components;
pub mod contour;
pub mod detect;
pub mod detector;
pub mod error;
pub mod geometry;
pub mod morphology;
pub mod multiscale;
pub mod nms;
pub mod pool;
pub mod preprocess;
pub mod runtime;
pub mod serialize;
pub mod threshold;

pub use detector::{Detector, DetectorConfig};
pub use error::{OcrError, OcrResult};

/// Get library version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
