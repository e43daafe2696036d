//! Probability-map statistics and adaptive threshold selection
//! (Otsu, histogram-heuristic, dynamic/percentile).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdMethod {
    Otsu,
    Histogram,
    Dynamic,
}

#[derive(Debug, Clone, Copy)]
pub struct AdaptiveThresholdConfig {
    pub enabled: bool,
    pub method: ThresholdMethod,
    pub min_db: f32,
    pub max_db: f32,
    pub min_box: f32,
    pub max_box: f32,
    pub histogram_bins: usize,
    pub otsu_multiplier: f32,
}

impl Default for AdaptiveThresholdConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            method: ThresholdMethod::Otsu,
            min_db: 0.1,
            max_db: 0.5,
            min_box: 0.3,
            max_box: 0.8,
            histogram_bins: 256,
            otsu_multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ThresholdResult {
    pub db_thresh: f32,
    pub box_thresh: f32,
    pub method: &'static str,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct MapStats {
    pub mean: f32,
    pub std_dev: f32,
    pub median: f32,
    pub min: f32,
    pub max: f32,
    pub dynamic_range: f32,
    pub high_prob_ratio: f32,
    pub bimodality_index: f32,
}

/// Compute summary statistics of a probability map, including a
/// histogram-derived bimodality index (2+ peaks -> 1.0, exactly one -> 0.5,
/// else 0.0; a peak is a 50-bin histogram bucket whose count exceeds 1% of
/// total pixels and is a local maximum).
pub fn compute_map_stats(prob: &[f32]) -> MapStats {
    if prob.is_empty() {
        return MapStats {
            mean: 0.0,
            std_dev: 0.0,
            median: 0.0,
            min: 0.0,
            max: 0.0,
            dynamic_range: 0.0,
            high_prob_ratio: 0.0,
            bimodality_index: 0.0,
        };
    }

    let n = prob.len() as f64;
    let sum: f64 = prob.iter().map(|&p| p as f64).sum();
    let mean = sum / n;
    let var = prob.iter().map(|&p| (p as f64 - mean).powi(2)).sum::<f64>() / n;
    let std_dev = var.sqrt();

    let mut sorted: Vec<f32> = prob.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median = percentile(&sorted, 0.5);
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let high_prob_ratio = prob.iter().filter(|&&p| p > 0.5).count() as f32 / prob.len() as f32;

    const BINS: usize = 50;
    let mut hist = [0u32; BINS];
    for &p in prob {
        let b = ((p.clamp(0.0, 1.0) * BINS as f32) as usize).min(BINS - 1);
        hist[b] += 1;
    }
    let peak_thresh = (prob.len() as f32) * 0.01;
    let mut peaks = 0;
    for i in 0..BINS {
        let h = hist[i] as f32;
        if h <= peak_thresh {
            continue;
        }
        let left_ok = i == 0 || hist[i - 1] <= hist[i];
        let right_ok = i == BINS - 1 || hist[i + 1] <= hist[i];
        if left_ok && right_ok {
            peaks += 1;
        }
    }
    let bimodality_index = if peaks >= 2 {
        1.0
    } else if peaks == 1 {
        0.5
    } else {
        0.0
    };

    MapStats {
        mean: mean as f32,
        std_dev: std_dev as f32,
        median,
        min,
        max,
        dynamic_range: max - min,
        high_prob_ratio,
        bimodality_index,
    }
}

fn percentile(sorted: &[f32], q: f64) -> f32 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn otsu_threshold(prob: &[f32], multiplier: f32) -> f32 {
    const BINS: usize = 256;
    let mut hist = [0u32; BINS];
    for &p in prob {
        let b = ((p.clamp(0.0, 1.0) * (BINS - 1) as f32).round() as usize).min(BINS - 1);
        hist[b] += 1;
    }
    let total = prob.len() as f64;
    let sum_total: f64 = hist.iter().enumerate().map(|(i, &c)| i as f64 * c as f64).sum();

    let mut sum_b = 0.0f64;
    let mut w_b = 0.0f64;
    let mut best_var = -1.0f64;
    let mut best_bin = 0usize;

    for i in 0..BINS {
        w_b += hist[i] as f64;
        if w_b == 0.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f <= 0.0 {
            break;
        }
        sum_b += i as f64 * hist[i] as f64;
        let mean_b = sum_b / w_b;
        let mean_f = (sum_total - sum_b) / w_f;
        let between = w_b * w_f * (mean_b - mean_f).powi(2);
        if between > best_var {
            best_var = between;
            best_bin = i;
        }
    }

    (best_bin as f32 / (BINS - 1) as f32) * multiplier
}

fn clamp(v: f32, lo: f32, hi: f32) -> f32 {
    v.clamp(lo.min(hi), lo.max(hi))
}

/// Select db/box thresholds per `cfg.method`, or the disabled defaults if
/// `cfg.enabled` is false. Both thresholds are clamped into their
/// configured ranges, then `box >= db` is enforced as a final repair.
pub fn select_thresholds(prob: &[f32], cfg: &AdaptiveThresholdConfig) -> ThresholdResult {
    if !cfg.enabled {
        return ThresholdResult {
            db_thresh: 0.3,
            box_thresh: 0.5,
            method: "disabled",
            confidence: 0.0,
        };
    }

    let stats = compute_map_stats(prob);

    let (mut db, mut boxt, method) = match cfg.method {
        ThresholdMethod::Otsu => {
            let db = otsu_threshold(prob, cfg.otsu_multiplier);
            (db, db + 0.2, "otsu")
        }
        ThresholdMethod::Histogram => {
            let mut db = stats.mean - 0.5 * stats.std_dev;
            let mut boxt = stats.mean + 0.2 * stats.std_dev;

            if stats.bimodality_index > 0.7 {
                db = stats.mean - 0.3 * stats.std_dev;
                boxt = stats.mean + 0.3 * stats.std_dev;
            } else if stats.bimodality_index < 0.3 {
                db = stats.mean - 0.7 * stats.std_dev;
                boxt = stats.mean + 0.1 * stats.std_dev;
            }

            if stats.high_prob_ratio > 0.3 {
                db += 0.1;
                boxt += 0.1;
            } else if stats.high_prob_ratio < 0.05 {
                db -= 0.1;
                boxt -= 0.05;
            }

            (db, boxt, "histogram")
        }
        ThresholdMethod::Dynamic => {
            let mut sorted: Vec<f32> = prob.to_vec();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let p25 = percentile(&sorted, 0.25);
            let p75 = percentile(&sorted, 0.75);
            let p90 = percentile(&sorted, 0.90);

            let db = if stats.dynamic_range > 0.8 {
                p25 + 0.3 * (p75 - p25)
            } else {
                stats.mean - 0.5 * stats.std_dev
            };
            let boxt = if stats.high_prob_ratio > 0.2 {
                p75
            } else {
                stats.median + 0.2 * (p90 - stats.median)
            };
            (db, boxt, "dynamic")
        }
    };

    db = clamp(db, cfg.min_db, cfg.max_db);
    boxt = clamp(boxt, cfg.min_box, cfg.max_box);

    if boxt < db {
        boxt = (db + 0.1).min(cfg.max_box);
    }

    ThresholdResult {
        db_thresh: db,
        box_thresh: boxt,
        method,
        confidence: stats.bimodality_index,
    }
}
