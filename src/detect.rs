//! The DB post-processor: binarize -> connected components -> per-region
//! confidence scoring/calibration -> polygon/rectangle fitting -> filtering.

use crate::components::{connected_components_with_probs, ComponentStats};
use crate::contour::trace_contour;
use crate::geometry::{bounding_box, minimum_area_rectangle, simplify_polygon, unclip_polygon, Point, Polygon, RegionBox};
use crate::pool::get_bool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceMethod {
    Mean,
    Max,
    MeanVar,
}

#[derive(Debug, Clone, Copy)]
pub struct PostProcessOptions {
    pub use_min_area_rect: bool,
    pub confidence_method: ConfidenceMethod,
    pub calibration_gamma: f32,
    pub adaptive_confidence: bool,
    pub adaptive_confidence_scale: f32,
}

impl Default for PostProcessOptions {
    fn default() -> Self {
        Self {
            use_min_area_rect: true,
            confidence_method: ConfidenceMethod::Mean,
            calibration_gamma: 0.0,
            adaptive_confidence: false,
            adaptive_confidence_scale: 0.2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectedRegion {
    pub polygon: Polygon,
    pub bbox: RegionBox,
    pub confidence: f32,
}

fn component_confidence(stats: &ComponentStats, method: ConfidenceMethod) -> f32 {
    match method {
        ConfidenceMethod::Mean => stats.mean() as f32,
        ConfidenceMethod::Max => stats.max_prob,
        ConfidenceMethod::MeanVar => {
            let mean = stats.mean();
            let var = (stats.sum_sq / stats.count as f64) - mean * mean;
            let denom = mean * (1.0 - mean);
            let normalized_variance = if denom.abs() < 1e-9 { 0.0 } else { (var / denom).clamp(0.0, 1.0) };
            (mean * (1.0 - 0.5 * normalized_variance)) as f32
        }
    }
}

fn calibrate(conf: f32, gamma: f32) -> f32 {
    let c = conf.clamp(0.0, 1.0);
    if gamma > 0.0 && (gamma - 1.0).abs() > 1e-9 {
        c.powf(gamma).clamp(0.0, 1.0)
    } else {
        c
    }
}

fn bbox_polygon(stats: &ComponentStats) -> Polygon {
    vec![
        Point::new(stats.min_x as f64, stats.min_y as f64),
        Point::new(stats.max_x as f64 + 1.0, stats.min_y as f64),
        Point::new(stats.max_x as f64 + 1.0, stats.max_y as f64 + 1.0),
        Point::new(stats.min_x as f64, stats.max_y as f64 + 1.0),
    ]
}

/// Core DB post-processing entry point. Returns an empty `Vec` for any
/// degenerate input (shape mismatch, non-positive dims) rather than an error.
pub fn post_process_db(
    prob: &[f32],
    width: usize,
    height: usize,
    db_thresh: f32,
    box_min_conf: f32,
    opts: &PostProcessOptions,
) -> Vec<DetectedRegion> {
    if width == 0 || height == 0 || prob.len() != width * height {
        return Vec::new();
    }

    let mut mask = get_bool(width * height);
    for (i, &p) in prob.iter().enumerate() {
        mask[i] = p >= db_thresh;
    }

    let (components, labels) = connected_components_with_probs(&mask, prob, width, height);

    let mut regions = Vec::with_capacity(components.len());

    for (i, stats) in components.iter().enumerate() {
        if stats.count == 0 {
            continue;
        }
        let label = i as i32 + 1;

        let mut conf = component_confidence(stats, opts.confidence_method);
        conf = calibrate(conf, opts.calibration_gamma);

        let mut polygon = trace_contour(&labels, stats, label);
        if polygon.is_empty() {
            polygon = bbox_polygon(stats);
        }

        let comp_w = (stats.max_x - stats.min_x + 1) as f64;
        let comp_h = (stats.max_y - stats.min_y + 1) as f64;
        let eps = 0.5f64.max(0.01 * comp_w.max(comp_h));
        polygon = simplify_polygon(&polygon, eps);

        polygon = unclip_polygon(&polygon, 1.10);

        if opts.use_min_area_rect && polygon.len() >= 3 {
            polygon = minimum_area_rectangle(&polygon);
        }

        let Some(raw_bbox) = bounding_box(&polygon) else {
            continue;
        };
        let bbox = RegionBox {
            min_x: raw_bbox.min_x.max(0.0),
            min_y: raw_bbox.min_y.max(0.0),
            max_x: (raw_bbox.max_x + 1.0).min(width as f64),
            max_y: (raw_bbox.max_y + 1.0).min(height as f64),
        };

        if polygon.len() < 3 {
            continue;
        }

        regions.push(DetectedRegion {
            polygon,
            bbox,
            confidence: conf.clamp(0.0, 1.0),
        });
    }

    filter_by_confidence(regions, box_min_conf, width, height, opts)
}

fn filter_by_confidence(
    regions: Vec<DetectedRegion>,
    box_min_conf: f32,
    width: usize,
    height: usize,
    opts: &PostProcessOptions,
) -> Vec<DetectedRegion> {
    let image_area = (width * height) as f64;
    regions
        .into_iter()
        .filter(|r| {
            let mut threshold = box_min_conf;
            if opts.adaptive_confidence {
                let normalized_area = r.bbox.area() / image_area;
                if normalized_area < 0.01 {
                    let reduction = (opts.adaptive_confidence_scale as f64 * (1.0 - normalized_area / 0.01))
                        .clamp(0.0, opts.adaptive_confidence_scale as f64);
                    threshold -= reduction as f32;
                }
            }
            r.confidence >= threshold
        })
        .collect()
}
