//! Integration tests exercising the public `Detector` API end-to-end
//! against `MockRuntime`, including the multi-scale merge scenario.

use image::DynamicImage;

use textdet_core::cancel::Cancellation;
use textdet_core::detector::{Detector, DetectorConfig, PolygonMode};
use textdet_core::error::OcrError;
use textdet_core::multiscale::MultiScaleConfig;
use textdet_core::runtime::mock::{map_to_output, MockRuntime};

fn base_config() -> DetectorConfig {
    DetectorConfig {
        model_path: "mock://det".into(),
        db_thresh: 0.5,
        db_box_thresh: 0.5,
        polygon_mode: PolygonMode::Contour,
        ..Default::default()
    }
}

#[test]
fn all_zero_probability_map_yields_no_regions() {
    let out = map_to_output(&[0.0; 64 * 64], 64, 64);
    let runtime = MockRuntime::constant(out);
    let detector = Detector::new(&runtime, base_config()).unwrap();

    let image = DynamicImage::new_rgb8(64, 64);
    let regions = detector.detect(&image, &Cancellation::none()).unwrap();
    assert!(regions.is_empty());
}

#[test]
fn high_confidence_map_yields_a_region_within_bounds() {
    let out = map_to_output(&[1.0; 64 * 64], 64, 64);
    let runtime = MockRuntime::constant(out);
    let detector = Detector::new(&runtime, base_config()).unwrap();

    let image = DynamicImage::new_rgb8(64, 64);
    let regions = detector.detect(&image, &Cancellation::none()).unwrap();
    assert!(!regions.is_empty());
    for r in &regions {
        assert!(r.confidence >= 0.0 && r.confidence <= 1.0);
        assert!(r.bbox.min_x >= 0.0 && r.bbox.min_y >= 0.0);
        assert!(r.bbox.max_x <= image.width() as f64 + 1.0);
        assert!(r.bbox.max_y <= image.height() as f64 + 1.0);
    }
}

#[test]
fn shutdown_then_detect_fails_with_session_closed() {
    let out = map_to_output(&[1.0; 32 * 32], 32, 32);
    let runtime = MockRuntime::constant(out);
    let detector = Detector::new(&runtime, base_config()).unwrap();
    detector.shutdown();

    let image = DynamicImage::new_rgb8(32, 32);
    let err = detector.detect(&image, &Cancellation::none()).unwrap_err();
    assert!(matches!(err, OcrError::SessionClosed));
}

#[test]
fn cancelled_before_call_short_circuits() {
    let out = map_to_output(&[1.0; 32 * 32], 32, 32);
    let runtime = MockRuntime::constant(out);
    let detector = Detector::new(&runtime, base_config()).unwrap();

    let cancel = Cancellation::none();
    cancel.cancel();

    let image = DynamicImage::new_rgb8(32, 32);
    let err = detector.detect(&image, &cancel).unwrap_err();
    assert!(matches!(err, OcrError::Cancelled));
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let out = map_to_output(&[0.0; 4], 2, 2);
    let runtime = MockRuntime::constant(out);
    let cfg = DetectorConfig {
        model_path: String::new(),
        ..base_config()
    };
    let err = Detector::new(&runtime, cfg).unwrap_err();
    assert!(matches!(err, OcrError::ConfigInvalid(_)));
}

#[test]
fn failing_runtime_surfaces_runtime_failure_at_construction() {
    let runtime = MockRuntime::failing();
    let err = Detector::new(&runtime, base_config()).unwrap_err();
    assert!(matches!(err, OcrError::RuntimeFailure(_)));
}

#[test]
fn multi_scale_incremental_merge_produces_one_region_per_contributor_cluster() {
    let out = map_to_output(&[1.0; 128 * 128], 128, 128);
    let runtime = MockRuntime::constant(out);

    let mut cfg = base_config();
    cfg.multi_scale = MultiScaleConfig {
        enabled: true,
        scales: vec![1.0, 0.5],
        merge_iou: 0.3,
        adaptive: false,
        max_levels: 2,
        min_side: 16.0,
        incremental_merge: true,
    };
    let detector = Detector::new(&runtime, cfg).unwrap();

    let image = DynamicImage::new_rgb8(128, 128);
    let regions = detector.detect(&image, &Cancellation::none()).unwrap();

    // Both scales see the same fully-saturated map, so their detections
    // should land on the same region after coordinate rescale and merge
    // into a single cluster rather than double-counting.
    assert_eq!(regions.len(), 1);
}
