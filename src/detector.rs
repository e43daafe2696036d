//! Top-level detector API: owns a tensor-runtime session behind a
//! reader/writer lock, and wires preprocessing, DB post-processing,
//! NMS, and multi-scale orchestration into one callable surface.

use std::sync::{Arc, RwLock};

use image::DynamicImage;
use log::warn;

use crate::batch::{self, PreparedImage};
use crate::cancel::Cancellation;
use crate::detect::{post_process_db, DetectedRegion, PostProcessOptions};
use crate::error::{OcrError, OcrResult};
use crate::geometry::Point;
use crate::morphology::{apply_morphology, MorphConfig, MorphOp};
use crate::multiscale::{compute_scale_factors, merge_regions, rescale_region, MultiScaleConfig};
use crate::nms::{apply_nms, NmsMethod, NmsSettings};
use crate::preprocess::{normalize_pooled, resize_for_detection, NormalizeParams, PrepConstraints};
use crate::runtime::{GpuConfig, TensorRuntime, TensorSession};
use crate::threshold::{select_thresholds, AdaptiveThresholdConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonMode {
    MinRect,
    Contour,
}

/// Every option a detector instance is configured with, per the external
/// interface contract. Immutable for the lifetime of one detection call.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub model_path: String,
    pub db_thresh: f32,
    pub db_box_thresh: f32,
    pub max_image_size: u32,
    pub use_server_model: bool,
    pub num_threads: usize,
    pub use_nms: bool,
    pub nms_threshold: f64,
    pub nms_method: NmsMethod,
    pub soft_nms_sigma: f64,
    pub soft_nms_thresh: f32,
    pub polygon_mode: PolygonMode,
    pub gpu: GpuConfig,
    pub use_adaptive_nms: bool,
    pub adaptive_nms_scale: f64,
    pub size_aware_nms: bool,
    pub min_region_size: f64,
    pub max_region_size: f64,
    pub size_nms_scale_factor: f64,
    pub morphology: MorphConfig,
    pub adaptive_thresholds: AdaptiveThresholdConfig,
    pub multi_scale: MultiScaleConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: String::new(),
            db_thresh: 0.3,
            db_box_thresh: 0.5,
            max_image_size: 960,
            use_server_model: false,
            num_threads: 1,
            use_nms: true,
            nms_threshold: 0.3,
            nms_method: NmsMethod::Hard,
            soft_nms_sigma: 0.5,
            soft_nms_thresh: 0.1,
            polygon_mode: PolygonMode::MinRect,
            gpu: GpuConfig::default(),
            use_adaptive_nms: false,
            adaptive_nms_scale: 1.0,
            size_aware_nms: false,
            min_region_size: 32.0,
            max_region_size: 1024.0,
            size_nms_scale_factor: 0.1,
            morphology: MorphConfig {
                operation: MorphOp::None,
                kernel_size: 3,
                iterations: 1,
            },
            adaptive_thresholds: AdaptiveThresholdConfig::default(),
            multi_scale: MultiScaleConfig::default(),
        }
    }
}

impl DetectorConfig {
    fn validate(&self) -> OcrResult<()> {
        if self.model_path.is_empty() {
            return Err(OcrError::ConfigInvalid("model_path must not be empty".into()));
        }
        if self.adaptive_thresholds.min_db > self.adaptive_thresholds.max_db {
            return Err(OcrError::ConfigInvalid("adaptive_thresholds: min_db > max_db".into()));
        }
        if self.adaptive_thresholds.min_box > self.adaptive_thresholds.max_box {
            return Err(OcrError::ConfigInvalid("adaptive_thresholds: min_box > max_box".into()));
        }
        Ok(())
    }

    fn nms_settings(&self) -> NmsSettings {
        NmsSettings {
            use_nms: self.use_nms,
            method: self.nms_method,
            nms_threshold: self.nms_threshold,
            soft_nms_sigma: self.soft_nms_sigma,
            soft_nms_thresh: self.soft_nms_thresh,
            use_adaptive_nms: self.use_adaptive_nms,
            adaptive_nms_scale: self.adaptive_nms_scale,
            size_aware_nms: self.size_aware_nms,
            min_region_size: self.min_region_size,
            max_region_size: self.max_region_size,
            size_nms_scale_factor: self.size_nms_scale_factor,
        }
    }

    fn post_process_options(&self) -> PostProcessOptions {
        PostProcessOptions {
            use_min_area_rect: self.polygon_mode == PolygonMode::MinRect,
            ..Default::default()
        }
    }
}

/// Owns a tensor-runtime session behind a reader/writer lock. All
/// inference paths take the read lock, clone the `Arc`, and release it
/// before calling into the runtime. `shutdown` takes the write lock once.
pub struct Detector {
    config: DetectorConfig,
    session: RwLock<Option<Arc<dyn TensorSession>>>,
}

impl Detector {
    pub fn new(runtime: &dyn TensorRuntime, config: DetectorConfig) -> OcrResult<Self> {
        config.validate()?;
        let session = runtime
            .load_model(&config.model_path, &config.gpu, config.num_threads)
            .map_err(OcrError::RuntimeFailure)?;
        Ok(Self {
            config,
            session: RwLock::new(Some(Arc::from(session))),
        })
    }

    fn acquire_session(&self) -> OcrResult<Arc<dyn TensorSession>> {
        let guard = self.session.read().expect("session lock poisoned");
        guard.clone().ok_or(OcrError::SessionClosed)
    }

    /// Idempotent shutdown: subsequent inference attempts fail with
    /// `SessionClosed` rather than racing a dangling handle.
    pub fn shutdown(&self) {
        let mut guard = self.session.write().expect("session lock poisoned");
        *guard = None;
    }

    fn prep_constraints(&self) -> PrepConstraints {
        PrepConstraints {
            min_w: 32,
            min_h: 32,
            max_w: self.config.max_image_size,
            max_h: self.config.max_image_size,
        }
    }

    /// Run detection at a single scale (the scale-local probability map
    /// comes straight from the runtime at the image's natural resize).
    fn detect_at_scale(
        &self,
        image: &DynamicImage,
        scale: f64,
        cancel: &Cancellation,
    ) -> OcrResult<Vec<DetectedRegion>> {
        cancel.check()?;

        let constraints = self.prep_constraints();
        let (orig_w, orig_h) = (image.width(), image.height());
        let scaled_w = ((orig_w as f64) * scale).round().max(1.0) as u32;
        let scaled_h = ((orig_h as f64) * scale).round().max(1.0) as u32;

        let scaled_image = if scale == 1.0 {
            image.clone()
        } else {
            image.resize_exact(scaled_w, scaled_h, image::imageops::FilterType::Lanczos3)
        };

        let resized = resize_for_detection(&scaled_image, &constraints)?;
        let (data, w, h) = normalize_pooled(&resized, &NormalizeParams::default());

        let prepared = PreparedImage {
            data: data.into_vec(),
            width: w as usize,
            height: h as usize,
        };

        cancel.check()?;
        let session = self.acquire_session()?;
        let output = batch::run_single(session.as_ref(), prepared)?;
        cancel.check()?;

        let prob = apply_morphology(&output.prob, output.width, output.height, &self.config.morphology);

        let (db_thresh, box_thresh) = if self.config.adaptive_thresholds.enabled {
            let t = select_thresholds(&prob, &self.config.adaptive_thresholds);
            (t.db_thresh, t.box_thresh)
        } else {
            (self.config.db_thresh, self.config.db_box_thresh)
        };

        let regions = post_process_db(
            &prob,
            output.width,
            output.height,
            db_thresh,
            box_thresh,
            &self.config.post_process_options(),
        );

        // Region coordinates are in map space (output.width/height), not
        // resized-input space; the runtime may return a map at a different
        // resolution than the tensor it was fed.
        let scale_to_map = output.width as f64 / orig_w.max(1) as f64;
        let (orig_w_f, orig_h_f) = (orig_w as f64, orig_h as f64);
        let rescaled: Vec<DetectedRegion> = regions
            .into_iter()
            .map(|r| rescale_region(&r, scale_to_map))
            .map(|r| clamp_region(&r, orig_w_f, orig_h_f))
            .collect();

        Ok(rescaled)
    }

    /// Run detection over the image, honoring the configured multi-scale
    /// orchestration if enabled, and applying NMS to the final result.
    pub fn detect(&self, image: &DynamicImage, cancel: &Cancellation) -> OcrResult<Vec<DetectedRegion>> {
        if !self.config.multi_scale.enabled {
            let regions = self.detect_at_scale(image, 1.0, cancel)?;
            return Ok(apply_nms(regions, &self.config.nms_settings()));
        }

        let scales = compute_scale_factors(image.width(), image.height(), &self.config.multi_scale);
        let merge_iou = self.config.multi_scale.merge_iou;
        let nms_settings = self.config.nms_settings();

        if self.config.multi_scale.incremental_merge {
            let mut accumulator = Vec::new();
            for scale in scales {
                match self.detect_at_scale(image, scale, cancel) {
                    Ok(regions) => {
                        accumulator = merge_regions(accumulator, regions, merge_iou, &nms_settings);
                    }
                    Err(OcrError::Cancelled) => return Err(OcrError::Cancelled),
                    Err(e) => warn!("scale {scale} failed, skipping: {e}"),
                }
            }
            Ok(accumulator)
        } else {
            let mut all = Vec::new();
            for scale in scales {
                match self.detect_at_scale(image, scale, cancel) {
                    Ok(mut regions) => all.append(&mut regions),
                    Err(OcrError::Cancelled) => return Err(OcrError::Cancelled),
                    Err(e) => warn!("scale {scale} failed, skipping: {e}"),
                }
            }
            Ok(merge_regions(Vec::new(), all, merge_iou, &nms_settings))
        }
    }
}

/// Clamp a rescaled region's bbox and polygon into `[0, w] x [0, h]`,
/// preserving the §8 invariant `0 <= min <= max <= w/h` after mapping
/// map-space coordinates back to the original image.
fn clamp_region(region: &DetectedRegion, w: f64, h: f64) -> DetectedRegion {
    let polygon: Vec<Point> = region
        .polygon
        .iter()
        .map(|p| Point::new(p.x.clamp(0.0, w), p.y.clamp(0.0, h)))
        .collect();
    DetectedRegion {
        polygon,
        bbox: region.bbox.clamp(w, h),
        confidence: region.confidence,
    }
}
