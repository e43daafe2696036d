use criterion::{criterion_group, criterion_main, Criterion};
use std::time::Duration;

use textdet_core::detect::{post_process_db, DetectedRegion, PostProcessOptions};
use textdet_core::geometry::{Point, RegionBox};
use textdet_core::morphology::{apply_morphology, MorphConfig, MorphOp};
use textdet_core::nms::{apply_nms, NmsMethod, NmsSettings};

const W: usize = 320;
const H: usize = 320;

/// A probability map with a handful of blurred rectangular blobs, standing
/// in for what a real DB segmentation head would emit.
fn synthetic_prob_map() -> Vec<f32> {
    let mut prob = vec![0.0f32; W * H];
    let blobs = [(20, 20, 60, 50), (120, 40, 180, 90), (60, 150, 140, 230), (200, 180, 280, 260)];
    for &(x0, y0, x1, y1) in &blobs {
        for y in y0..y1 {
            for x in x0..x1 {
                let dx = (x - x0).min(x1 - x) as f32;
                let dy = (y - y0).min(y1 - y) as f32;
                let edge = dx.min(dy) / 10.0;
                prob[y * W + x] = edge.min(1.0) * 0.9;
            }
        }
    }
    prob
}

fn overlapping_regions(n: usize) -> Vec<DetectedRegion> {
    (0..n)
        .map(|i| {
            let offset = (i as f64) * 2.0;
            let b = RegionBox {
                min_x: offset,
                min_y: offset,
                max_x: offset + 100.0,
                max_y: offset + 40.0,
            };
            DetectedRegion {
                polygon: vec![
                    Point::new(b.min_x, b.min_y),
                    Point::new(b.max_x, b.min_y),
                    Point::new(b.max_x, b.max_y),
                    Point::new(b.min_x, b.max_y),
                ],
                bbox: b,
                confidence: 0.9 - (i as f32) * 0.01,
            }
        })
        .collect()
}

fn bench_post_process_db(c: &mut Criterion) {
    let prob = synthetic_prob_map();

    let mut group = c.benchmark_group("post_process_db");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("min_area_rect", |b| {
        b.iter(|| {
            post_process_db(&prob, W, H, 0.3, 0.5, &PostProcessOptions::default());
        });
    });

    group.bench_function("contour_polygon", |b| {
        let opts = PostProcessOptions {
            use_min_area_rect: false,
            ..Default::default()
        };
        b.iter(|| {
            post_process_db(&prob, W, H, 0.3, 0.5, &opts);
        });
    });

    group.finish();
}

fn bench_morphology(c: &mut Criterion) {
    let prob = synthetic_prob_map();

    let mut group = c.benchmark_group("morphology");
    group.measurement_time(Duration::from_secs(5));

    for op in [MorphOp::Dilate, MorphOp::Erode, MorphOp::Open, MorphOp::Close, MorphOp::Smooth] {
        let cfg = MorphConfig { operation: op, kernel_size: 3, iterations: 1 };
        group.bench_function(format!("{op:?}"), |b| {
            b.iter(|| {
                apply_morphology(&prob, W, H, &cfg);
            });
        });
    }

    group.finish();
}

fn bench_nms(c: &mut Criterion) {
    let regions = overlapping_regions(200);

    let mut group = c.benchmark_group("nms");
    group.measurement_time(Duration::from_secs(5));

    let variants = [
        ("hard", NmsSettings { method: NmsMethod::Hard, ..Default::default() }),
        ("soft_linear", NmsSettings { method: NmsMethod::Linear, ..Default::default() }),
        ("soft_gaussian", NmsSettings { method: NmsMethod::Gaussian, ..Default::default() }),
        ("adaptive", NmsSettings { use_adaptive_nms: true, ..Default::default() }),
        ("size_aware", NmsSettings { size_aware_nms: true, ..Default::default() }),
    ];

    for (name, settings) in variants {
        group.bench_function(name, |b| {
            b.iter(|| {
                apply_nms(regions.clone(), &settings);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_post_process_db, bench_morphology, bench_nms);
criterion_main!(benches);
