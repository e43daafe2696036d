//! Non-maximum suppression family: hard, soft (linear/Gaussian), adaptive,
//! and size-aware variants, all operating over axis-aligned region boxes.

use crate::geometry::RegionBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NmsMethod {
    Hard,
    Linear,
    Gaussian,
}

/// Intersection-over-union of two boxes. 0 for non-overlapping boxes or
/// boxes with non-positive area.
pub fn compute_region_iou(a: &RegionBox, b: &RegionBox) -> f64 {
    if a.area() <= 0.0 || b.area() <= 0.0 {
        return 0.0;
    }
    let ix0 = a.min_x.max(b.min_x);
    let iy0 = a.min_y.max(b.min_y);
    let ix1 = a.max_x.min(b.max_x);
    let iy1 = a.max_y.min(b.max_y);
    let iw = (ix1 - ix0).max(0.0);
    let ih = (iy1 - iy0).max(0.0);
    let inter = iw * ih;
    if inter <= 0.0 {
        return 0.0;
    }
    let union = a.area() + b.area() - inter;
    if union <= 0.0 {
        return 0.0;
    }
    inter / union
}

/// Hard NMS: sort by confidence descending, keep a box, suppress any
/// later box whose IoU with it exceeds `iou_threshold`.
pub fn hard_nms(boxes: &[RegionBox], scores: &[f32], iou_threshold: f64) -> Vec<usize> {
    if boxes.len() <= 1 {
        return (0..boxes.len()).collect();
    }

    let mut order: Vec<usize> = (0..boxes.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap());

    let mut suppressed = vec![false; boxes.len()];
    let mut keep = Vec::new();

    for &i in &order {
        if suppressed[i] {
            continue;
        }
        keep.push(i);
        for &j in &order {
            if j == i || suppressed[j] {
                continue;
            }
            if compute_region_iou(&boxes[i], &boxes[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Soft-NMS: decays confidence instead of discarding. Returns
/// `(kept_indices, decayed_scores)` sorted by decayed score descending,
/// after dropping anything below `score_thresh`.
pub fn soft_nms(
    boxes: &[RegionBox],
    scores: &[f32],
    method: NmsMethod,
    sigma: f64,
    iou_threshold: f64,
    score_thresh: f32,
) -> Vec<(usize, f32)> {
    if boxes.len() <= 1 {
        return (0..boxes.len())
            .filter(|&i| scores[i] >= score_thresh)
            .map(|i| (i, scores[i]))
            .collect();
    }

    let sigma = if sigma <= 0.0 { 0.5 } else { sigma };
    let mut working: Vec<f32> = scores.to_vec();
    let mut remaining: Vec<usize> = (0..boxes.len()).collect();
    let mut ordered: Vec<(usize, f32)> = Vec::with_capacity(boxes.len());

    while !remaining.is_empty() {
        let (pos, &best_idx) = remaining
            .iter()
            .enumerate()
            .max_by(|(_, &a), (_, &b)| working[a].partial_cmp(&working[b]).unwrap())
            .unwrap();
        remaining.remove(pos);
        let best_score = working[best_idx];

        for &j in &remaining {
            let iou = compute_region_iou(&boxes[best_idx], &boxes[j]);
            let weight = match method {
                NmsMethod::Linear => {
                    if iou > iou_threshold {
                        1.0 - iou
                    } else {
                        1.0
                    }
                }
                NmsMethod::Gaussian => (-(iou * iou) / sigma).exp(),
                NmsMethod::Hard => {
                    if iou <= iou_threshold {
                        1.0
                    } else {
                        0.0
                    }
                }
            };
            working[j] *= weight as f32;
        }

        ordered.push((best_idx, best_score));
    }

    ordered.retain(|&(_, s)| s >= score_thresh);
    ordered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    ordered
}

fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}

/// Adaptive NMS: hard-NMS structure, but the pairwise threshold depends
/// on the average box area and average confidence of the candidate pair.
pub fn adaptive_nms(boxes: &[RegionBox], scores: &[f32], base_threshold: f64, scale_factor: f64) -> Vec<usize> {
    if boxes.len() <= 1 {
        return (0..boxes.len()).collect();
    }

    let mut order: Vec<usize> = (0..boxes.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap());

    let mut suppressed = vec![false; boxes.len()];
    let mut keep = Vec::new();

    for &i in &order {
        if suppressed[i] {
            continue;
        }
        keep.push(i);
        for &j in &order {
            if j == i || suppressed[j] {
                continue;
            }
            let avg_area = (boxes[i].area() + boxes[j].area()) / 2.0;
            let avg_conf = (scores[i] as f64 + scores[j] as f64) / 2.0;
            let threshold = clamp(
                base_threshold * scale_factor + 0.1 * (avg_area / 10000.0).min(1.0) - 0.05 * (avg_conf - 0.5),
                0.1,
                0.8,
            );
            if compute_region_iou(&boxes[i], &boxes[j]) > threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Size-aware NMS: hard-NMS structure, but the pairwise threshold depends
/// on the average box size normalized against `[min_size, max_size]`.
pub fn size_aware_nms(
    boxes: &[RegionBox],
    scores: &[f32],
    base_threshold: f64,
    size_scale_factor: f64,
    min_size: f64,
    max_size: f64,
) -> Vec<usize> {
    if boxes.len() <= 1 {
        return (0..boxes.len()).collect();
    }

    let mut order: Vec<usize> = (0..boxes.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap());

    let mut suppressed = vec![false; boxes.len()];
    let mut keep = Vec::new();
    let range = max_size - min_size;

    for &i in &order {
        if suppressed[i] {
            continue;
        }
        keep.push(i);
        for &j in &order {
            if j == i || suppressed[j] {
                continue;
            }
            let avg_size = (boxes[i].area().sqrt() + boxes[j].area().sqrt()) / 2.0;
            let threshold = if range <= 0.0 {
                base_threshold
            } else {
                let normalized = clamp((avg_size - min_size) / range, 0.0, 1.0);
                base_threshold + size_scale_factor * (normalized - 0.5)
            };
            if compute_region_iou(&boxes[i], &boxes[j]) > threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// All NMS-related knobs a `DetectorConfig` exposes, collapsed into one
/// settings value so a single call site can dispatch the configured variant.
#[derive(Debug, Clone)]
pub struct NmsSettings {
    pub use_nms: bool,
    pub method: NmsMethod,
    pub nms_threshold: f64,
    pub soft_nms_sigma: f64,
    pub soft_nms_thresh: f32,
    pub use_adaptive_nms: bool,
    pub adaptive_nms_scale: f64,
    pub size_aware_nms: bool,
    pub min_region_size: f64,
    pub max_region_size: f64,
    pub size_nms_scale_factor: f64,
}

impl Default for NmsSettings {
    fn default() -> Self {
        Self {
            use_nms: true,
            method: NmsMethod::Hard,
            nms_threshold: 0.3,
            soft_nms_sigma: 0.5,
            soft_nms_thresh: 0.1,
            use_adaptive_nms: false,
            adaptive_nms_scale: 1.0,
            size_aware_nms: false,
            min_region_size: 32.0,
            max_region_size: 1024.0,
            size_nms_scale_factor: 0.1,
        }
    }
}

/// Dispatch to the configured NMS variant over a sequence of
/// [`crate::detect::DetectedRegion`]s. Adaptive NMS takes precedence over
/// size-aware, which takes precedence over the plain hard/soft choice.
pub fn apply_nms(regions: Vec<crate::detect::DetectedRegion>, settings: &NmsSettings) -> Vec<crate::detect::DetectedRegion> {
    if !settings.use_nms || regions.len() <= 1 {
        return regions;
    }

    let boxes: Vec<RegionBox> = regions.iter().map(|r| r.bbox).collect();
    let scores: Vec<f32> = regions.iter().map(|r| r.confidence).collect();

    if settings.use_adaptive_nms {
        let keep = adaptive_nms(&boxes, &scores, settings.nms_threshold, settings.adaptive_nms_scale);
        return select(regions, &keep);
    }

    if settings.size_aware_nms {
        let keep = size_aware_nms(
            &boxes,
            &scores,
            settings.nms_threshold,
            settings.size_nms_scale_factor,
            settings.min_region_size,
            settings.max_region_size,
        );
        return select(regions, &keep);
    }

    match settings.method {
        NmsMethod::Hard => {
            let keep = hard_nms(&boxes, &scores, settings.nms_threshold);
            select(regions, &keep)
        }
        method => {
            let decayed = soft_nms(
                &boxes,
                &scores,
                method,
                settings.soft_nms_sigma,
                settings.nms_threshold,
                settings.soft_nms_thresh,
            );
            decayed
                .into_iter()
                .map(|(i, score)| {
                    let mut r = regions[i].clone();
                    r.confidence = score;
                    r
                })
                .collect()
        }
    }
}

fn select(
    regions: Vec<crate::detect::DetectedRegion>,
    keep: &[usize],
) -> Vec<crate::detect::DetectedRegion> {
    let mut owned: Vec<Option<crate::detect::DetectedRegion>> = regions.into_iter().map(Some).collect();
    keep.iter().filter_map(|&i| owned[i].take()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rb(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> RegionBox {
        RegionBox { min_x, min_y, max_x, max_y }
    }

    #[test]
    fn iou_identical_boxes_is_one() {
        let a = rb(0.0, 0.0, 10.0, 10.0);
        assert!((compute_region_iou(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn iou_disjoint_boxes_is_zero() {
        let a = rb(0.0, 0.0, 10.0, 10.0);
        let b = rb(20.0, 20.0, 30.0, 30.0);
        assert_eq!(compute_region_iou(&a, &b), 0.0);
    }

    #[test]
    fn iou_is_symmetric() {
        let a = rb(0.0, 0.0, 10.0, 10.0);
        let b = rb(5.0, 5.0, 15.0, 15.0);
        assert_eq!(compute_region_iou(&a, &b), compute_region_iou(&b, &a));
    }

    #[test]
    fn hard_nms_keeps_nonoverlapping() {
        let boxes = vec![rb(0.0, 0.0, 10.0, 10.0), rb(20.0, 20.0, 30.0, 30.0)];
        let scores = vec![0.9f32, 0.7];
        let keep = hard_nms(&boxes, &scores, 0.5);
        assert_eq!(keep, vec![0, 1]);
    }

    #[test]
    fn hard_nms_suppresses_overlapping() {
        let boxes = vec![rb(0.0, 0.0, 10.0, 10.0), rb(1.0, 1.0, 9.0, 9.0)];
        let scores = vec![0.9f32, 0.8];
        let keep = hard_nms(&boxes, &scores, 0.5);
        assert_eq!(keep, vec![0]);
    }

    #[test]
    fn hard_nms_is_sorted_desc_and_subset() {
        let boxes = vec![
            rb(0.0, 0.0, 5.0, 5.0),
            rb(100.0, 100.0, 105.0, 105.0),
            rb(200.0, 200.0, 205.0, 205.0),
        ];
        let scores = vec![0.5f32, 0.9, 0.7];
        let keep = hard_nms(&boxes, &scores, 0.5);
        let kept_scores: Vec<f32> = keep.iter().map(|&i| scores[i]).collect();
        let mut sorted = kept_scores.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(kept_scores, sorted);
    }

    #[test]
    fn soft_nms_linear_both_survive_with_decay() {
        let boxes = vec![rb(0.0, 0.0, 10.0, 10.0), rb(1.0, 1.0, 9.0, 9.0)];
        let scores = vec![0.9f32, 0.8];
        let result = soft_nms(&boxes, &scores, NmsMethod::Linear, 0.5, 0.5, 0.1);
        assert_eq!(result.len(), 2);
        let second = result.iter().find(|&&(i, _)| i == 1).unwrap();
        assert!(second.1 > 0.1 && second.1 < 0.8);
    }

    #[test]
    fn soft_nms_weights_never_increase_score() {
        let boxes = vec![rb(0.0, 0.0, 10.0, 10.0), rb(0.0, 0.0, 10.0, 10.0)];
        let scores = vec![0.9f32, 0.9];
        let result = soft_nms(&boxes, &scores, NmsMethod::Gaussian, 0.5, 0.3, 0.0);
        for &(i, s) in &result {
            assert!(s <= scores[i]);
        }
    }

    #[test]
    fn single_input_returns_unchanged() {
        let boxes = vec![rb(0.0, 0.0, 10.0, 10.0)];
        let scores = vec![0.5f32];
        assert_eq!(hard_nms(&boxes, &scores, 0.5), vec![0]);
        assert_eq!(adaptive_nms(&boxes, &scores, 0.3, 1.0), vec![0]);
        assert_eq!(size_aware_nms(&boxes, &scores, 0.3, 0.1, 32.0, 1024.0), vec![0]);
    }

    #[test]
    fn size_aware_nms_falls_back_when_range_nonpositive() {
        let boxes = vec![rb(0.0, 0.0, 10.0, 10.0), rb(1.0, 1.0, 9.0, 9.0)];
        let scores = vec![0.9f32, 0.8];
        let keep = size_aware_nms(&boxes, &scores, 0.5, 0.1, 100.0, 100.0);
        assert_eq!(keep, vec![0]);
    }

    #[test]
    fn adaptive_nms_threshold_clamped_range() {
        let boxes = vec![rb(0.0, 0.0, 200.0, 200.0), rb(5.0, 5.0, 195.0, 195.0)];
        let scores = vec![0.95f32, 0.1];
        let keep = adaptive_nms(&boxes, &scores, 0.3, 1.0);
        assert!(!keep.is_empty());
    }

    fn region(box_: RegionBox, confidence: f32) -> crate::detect::DetectedRegion {
        crate::detect::DetectedRegion {
            polygon: vec![
                crate::geometry::Point::new(box_.min_x, box_.min_y),
                crate::geometry::Point::new(box_.max_x, box_.min_y),
                crate::geometry::Point::new(box_.max_x, box_.max_y),
                crate::geometry::Point::new(box_.min_x, box_.max_y),
            ],
            bbox: box_,
            confidence,
        }
    }

    #[test]
    fn apply_nms_disabled_is_identity() {
        let regions = vec![region(rb(0.0, 0.0, 10.0, 10.0), 0.9), region(rb(1.0, 1.0, 9.0, 9.0), 0.8)];
        let settings = NmsSettings {
            use_nms: false,
            ..Default::default()
        };
        let out = apply_nms(regions.clone(), &settings);
        assert_eq!(out.len(), regions.len());
    }

    #[test]
    fn apply_nms_hard_suppresses_overlap() {
        let regions = vec![region(rb(0.0, 0.0, 10.0, 10.0), 0.9), region(rb(1.0, 1.0, 9.0, 9.0), 0.8)];
        let settings = NmsSettings::default();
        let out = apply_nms(regions, &settings);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, 0.9);
    }

    #[test]
    fn apply_nms_soft_keeps_both_with_decay() {
        let regions = vec![region(rb(0.0, 0.0, 10.0, 10.0), 0.9), region(rb(1.0, 1.0, 9.0, 9.0), 0.8)];
        let settings = NmsSettings {
            method: NmsMethod::Linear,
            soft_nms_thresh: 0.1,
            ..Default::default()
        };
        let out = apply_nms(regions, &settings);
        assert_eq!(out.len(), 2);
    }
}
