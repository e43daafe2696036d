//! Multi-scale orchestration: scale-pyramid generation and incremental or
//! batched merge of per-scale detections into one deduplicated result.

use crate::detect::DetectedRegion;
use crate::geometry::{Point, RegionBox};
use crate::nms::{apply_nms, NmsSettings};

#[derive(Debug, Clone)]
pub struct MultiScaleConfig {
    pub enabled: bool,
    pub scales: Vec<f64>,
    pub merge_iou: f64,
    pub adaptive: bool,
    pub max_levels: usize,
    pub min_side: f64,
    pub incremental_merge: bool,
}

impl Default for MultiScaleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scales: vec![1.0],
            merge_iou: 0.0,
            adaptive: false,
            max_levels: 3,
            min_side: 64.0,
            incremental_merge: true,
        }
    }
}

/// Determine the scale factors to run detection at, per §4.J.1: adaptive
/// geometric decay from 1.0, or the explicit de-duplicated list (1.0
/// first), both truncated by `max_levels` and `min_side`.
pub fn compute_scale_factors(orig_w: u32, orig_h: u32, cfg: &MultiScaleConfig) -> Vec<f64> {
    let min_orig_side = orig_w.min(orig_h) as f64;

    if cfg.adaptive {
        let mut scales = Vec::new();
        let mut s = 1.0f64;
        loop {
            scales.push(s);
            if scales.len() >= cfg.max_levels {
                break;
            }
            let next = s * 0.75;
            if min_orig_side * next <= cfg.min_side {
                break;
            }
            s = next;
        }
        return scales;
    }

    let mut seen = std::collections::HashSet::new();
    let mut scales: Vec<f64> = Vec::new();
    let mut ordered = vec![1.0f64];
    ordered.extend(cfg.scales.iter().filter(|&&s| s > 0.0 && s != 1.0).copied());

    for s in ordered {
        let key = (s * 1e6).round() as i64;
        if !seen.insert(key) {
            continue;
        }
        if min_orig_side * s <= cfg.min_side && !scales.is_empty() {
            continue;
        }
        scales.push(s);
        if scales.len() >= cfg.max_levels {
            break;
        }
    }

    scales
}

/// Map a region detected against a scale-local probability map back to
/// original-image coordinates, given the scale factor used to produce
/// that map's dimensions from the original image.
pub fn rescale_region(region: &DetectedRegion, scale: f64) -> DetectedRegion {
    if scale == 1.0 {
        return region.clone();
    }
    let inv = 1.0 / scale;
    let polygon: Vec<Point> = region.polygon.iter().map(|p| Point::new(p.x * inv, p.y * inv)).collect();
    let bbox = RegionBox {
        min_x: region.bbox.min_x * inv,
        min_y: region.bbox.min_y * inv,
        max_x: region.bbox.max_x * inv,
        max_y: region.bbox.max_y * inv,
    };
    DetectedRegion {
        polygon,
        bbox,
        confidence: region.confidence,
    }
}

/// Fold `new_regions` into `accumulator`, applying the configured NMS
/// variant with `merge_iou` (falling back to `nms_settings.nms_threshold`
/// when `merge_iou <= 0`). Used after every scale in incremental mode, or
/// once at the end in batched mode.
pub fn merge_regions(
    accumulator: Vec<DetectedRegion>,
    new_regions: Vec<DetectedRegion>,
    merge_iou: f64,
    nms_settings: &NmsSettings,
) -> Vec<DetectedRegion> {
    let mut combined = accumulator;
    combined.extend(new_regions);

    let mut settings = nms_settings.clone();
    if merge_iou > 0.0 {
        settings.nms_threshold = merge_iou;
    }
    settings.use_nms = true;

    apply_nms(combined, &settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(box_: RegionBox, confidence: f32) -> DetectedRegion {
        DetectedRegion {
            polygon: vec![
                Point::new(box_.min_x, box_.min_y),
                Point::new(box_.max_x, box_.min_y),
                Point::new(box_.max_x, box_.max_y),
                Point::new(box_.min_x, box_.max_y),
            ],
            bbox: box_,
            confidence,
        }
    }

    #[test]
    fn adaptive_scales_decay_and_stop_at_min_side() {
        let cfg = MultiScaleConfig {
            adaptive: true,
            max_levels: 10,
            min_side: 100.0,
            ..Default::default()
        };
        let scales = compute_scale_factors(200, 200, &cfg);
        assert_eq!(scales[0], 1.0);
        for w in scales.windows(2) {
            assert!((w[1] - w[0] * 0.75).abs() < 1e-9);
        }
        assert!(*scales.last().unwrap() * 200.0 > 0.0);
    }

    #[test]
    fn adaptive_scales_respect_max_levels() {
        let cfg = MultiScaleConfig {
            adaptive: true,
            max_levels: 2,
            min_side: 1.0,
            ..Default::default()
        };
        let scales = compute_scale_factors(1000, 1000, &cfg);
        assert_eq!(scales.len(), 2);
    }

    #[test]
    fn explicit_scales_always_start_with_one() {
        let cfg = MultiScaleConfig {
            adaptive: false,
            scales: vec![0.5, 1.0, 0.5, 0.25],
            max_levels: 10,
            min_side: 1.0,
            ..Default::default()
        };
        let scales = compute_scale_factors(500, 500, &cfg);
        assert_eq!(scales[0], 1.0);
        let unique: std::collections::HashSet<_> = scales.iter().map(|s| (s * 1e6) as i64).collect();
        assert_eq!(unique.len(), scales.len());
    }

    #[test]
    fn rescale_region_divides_by_scale() {
        let r = region(RegionBox { min_x: 0.0, min_y: 0.0, max_x: 10.0, max_y: 10.0 }, 0.9);
        let rescaled = rescale_region(&r, 0.5);
        assert_eq!(rescaled.bbox.max_x, 20.0);
        assert_eq!(rescaled.bbox.max_y, 20.0);
    }

    #[test]
    fn rescale_region_identity_at_scale_one() {
        let r = region(RegionBox { min_x: 1.0, min_y: 2.0, max_x: 3.0, max_y: 4.0 }, 0.9);
        let rescaled = rescale_region(&r, 1.0);
        assert_eq!(rescaled.bbox.min_x, r.bbox.min_x);
    }

    #[test]
    fn merge_regions_deduplicates_overlapping_contributors() {
        let acc = vec![region(RegionBox { min_x: 0.0, min_y: 0.0, max_x: 10.0, max_y: 10.0 }, 0.9)];
        let fresh = vec![region(RegionBox { min_x: 1.0, min_y: 1.0, max_x: 11.0, max_y: 11.0 }, 0.7)];
        let merged = merge_regions(acc, fresh, 0.3, &NmsSettings::default());
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn merge_regions_keeps_disjoint_contributors() {
        let acc = vec![region(RegionBox { min_x: 0.0, min_y: 0.0, max_x: 10.0, max_y: 10.0 }, 0.9)];
        let fresh = vec![region(RegionBox { min_x: 100.0, min_y: 100.0, max_x: 110.0, max_y: 110.0 }, 0.7)];
        let merged = merge_regions(acc, fresh, 0.3, &NmsSettings::default());
        assert_eq!(merged.len(), 2);
    }
}
