//! Result serialization, validation, visualization, and reading-order
//! utilities over a detected-region sequence.

use image::{DynamicImage, Rgba};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

use crate::detect::DetectedRegion;
use crate::geometry::{Point, RegionBox};

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonPoint {
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonBox {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRegion {
    pub confidence: f32,
    pub r#box: JsonBox,
    pub polygon: Vec<JsonPoint>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonResult {
    pub width: i64,
    pub height: i64,
    pub regions: Vec<JsonRegion>,
}

/// Serialize detected regions to the documented JSON result schema.
pub fn to_json(regions: &[DetectedRegion], width: u32, height: u32) -> JsonResult {
    JsonResult {
        width: width as i64,
        height: height as i64,
        regions: regions
            .iter()
            .map(|r| JsonRegion {
                confidence: r.confidence,
                r#box: JsonBox {
                    x: r.bbox.min_x.round() as i64,
                    y: r.bbox.min_y.round() as i64,
                    w: r.bbox.width().round() as i64,
                    h: r.bbox.height().round() as i64,
                },
                polygon: r
                    .polygon
                    .iter()
                    .map(|p| JsonPoint {
                        x: p.x.round() as i64,
                        y: p.y.round() as i64,
                    })
                    .collect(),
            })
            .collect(),
    }
}

/// Reconstruct a region sequence from its JSON form. Integer coordinates
/// round-trip exactly; fractional precision lost in `to_json` is not
/// recoverable (documented int-rounding tolerance).
pub fn from_json(result: &JsonResult) -> Vec<DetectedRegion> {
    result
        .regions
        .iter()
        .map(|r| {
            let polygon: Vec<Point> = r.polygon.iter().map(|p| Point::new(p.x as f64, p.y as f64)).collect();
            DetectedRegion {
                bbox: RegionBox {
                    min_x: r.r#box.x as f64,
                    min_y: r.r#box.y as f64,
                    max_x: (r.r#box.x + r.r#box.w) as f64,
                    max_y: (r.r#box.y + r.r#box.h) as f64,
                },
                polygon,
                confidence: r.confidence,
            }
        })
        .collect()
}

/// Reject a region set if the canvas is degenerate or any region exits
/// its bounds.
pub fn validate_regions(regions: &[DetectedRegion], width: u32, height: u32) -> bool {
    if width == 0 || height == 0 {
        return false;
    }
    let (w, h) = (width as f64, height as f64);
    regions.iter().all(|r| {
        let b = &r.bbox;
        if b.width() <= 0.0 || b.height() <= 0.0 {
            return false;
        }
        if b.min_x < 0.0 || b.min_y < 0.0 || b.max_x > w || b.max_y > h {
            return false;
        }
        r.polygon.iter().all(|p| p.x >= 0.0 && p.x <= w && p.y >= 0.0 && p.y <= h)
    })
}

/// Draw each region's box and polygon onto a copy of `image`.
pub fn visualize_regions(image: &DynamicImage, regions: &[DetectedRegion], color: Rgba<u8>, _thickness: u32) -> DynamicImage {
    let mut canvas = image.to_rgba8();

    for region in regions {
        let b = &region.bbox;
        let rect = Rect::at(b.min_x.round() as i32, b.min_y.round() as i32)
            .of_size(b.width().round().max(1.0) as u32, b.height().round().max(1.0) as u32);
        draw_hollow_rect_mut(&mut canvas, rect, color);

        for window in region.polygon.windows(2) {
            draw_line_segment_mut(&mut canvas, (window[0].x as f32, window[0].y as f32), (window[1].x as f32, window[1].y as f32), color);
        }
        if let (Some(first), Some(last)) = (region.polygon.first(), region.polygon.last()) {
            draw_line_segment_mut(&mut canvas, (last.x as f32, last.y as f32), (first.x as f32, first.y as f32), color);
        }
    }

    DynamicImage::ImageRgba8(canvas)
}

const LINE_OVERLAP_RATIO: f64 = 0.5;

/// Sort regions into natural reading order: top-to-bottom by line, then
/// left-to-right within a line.
pub fn sort_reading_order(mut regions: Vec<DetectedRegion>) -> Vec<DetectedRegion> {
    regions.sort_by(|a, b| {
        let ay = (a.bbox.min_y + a.bbox.max_y) / 2.0;
        let by = (b.bbox.min_y + b.bbox.max_y) / 2.0;
        let a_h = a.bbox.height().max(1.0);
        if (ay - by).abs() < a_h * LINE_OVERLAP_RATIO {
            a.bbox.min_x.partial_cmp(&b.bbox.min_x).unwrap()
        } else {
            ay.partial_cmp(&by).unwrap()
        }
    });
    regions
}

/// Group regions into lines, where two regions share a line when their
/// vertical centers are within half the shorter box's height of each other.
pub fn group_by_line(regions: &[DetectedRegion]) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..regions.len()).collect();
    indices.sort_by(|&a, &b| {
        let ay = (regions[a].bbox.min_y + regions[a].bbox.max_y) / 2.0;
        let by = (regions[b].bbox.min_y + regions[b].bbox.max_y) / 2.0;
        ay.partial_cmp(&by).unwrap()
    });

    let mut lines: Vec<Vec<usize>> = Vec::new();
    for idx in indices {
        let center = (regions[idx].bbox.min_y + regions[idx].bbox.max_y) / 2.0;
        let height = regions[idx].bbox.height().max(1.0);

        let mut placed = false;
        if let Some(last_line) = lines.last_mut() {
            let ref_idx = last_line[0];
            let ref_center = (regions[ref_idx].bbox.min_y + regions[ref_idx].bbox.max_y) / 2.0;
            let ref_height = regions[ref_idx].bbox.height().max(1.0);
            if (center - ref_center).abs() < height.min(ref_height) * LINE_OVERLAP_RATIO {
                last_line.push(idx);
                placed = true;
            }
        }
        if !placed {
            lines.push(vec![idx]);
        }
    }

    for line in &mut lines {
        line.sort_by(|&a, &b| regions[a].bbox.min_x.partial_cmp(&regions[b].bbox.min_x).unwrap());
    }

    lines
}
