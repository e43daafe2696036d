//! Moore-Neighbor boundary tracing, restricted to a component's bounding box.

use crate::components::{ComponentStats, LabelField};
use crate::geometry::Point;

// Clockwise neighbor offsets starting at north and going clockwise.
const NEIGHBORS: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

fn is_label(field: &LabelField, x: i32, y: i32, label: i32) -> bool {
    if x < 0 || y < 0 || x as usize >= field.width || y as usize >= field.height {
        return false;
    }
    field.get(x as usize, y as usize) == label
}

fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

fn push_collinear_aware(poly: &mut Vec<Point>, p: Point) {
    poly.push(p);
    while poly.len() >= 3 {
        let n = poly.len();
        let o = (poly[n - 3].x, poly[n - 3].y);
        let a = (poly[n - 2].x, poly[n - 2].y);
        let b = (poly[n - 1].x, poly[n - 1].y);
        if cross(o, a, b) == 0.0 {
            poly.remove(n - 2);
        } else {
            break;
        }
    }
}

/// Trace the ordered boundary of component `label` within `field`, using
/// `stats` to restrict the search to its bounding box. Returns an empty
/// polygon for an invalid label, mismatched label-field dimensions, or an
/// empty component.
pub fn trace_contour(field: &LabelField, stats: &ComponentStats, label: i32) -> Vec<Point> {
    if label <= 0 || stats.count == 0 {
        return Vec::new();
    }
    if field.labels.len() != field.width * field.height {
        return Vec::new();
    }

    let (min_x, max_x) = (stats.min_x as i32, stats.max_x as i32);
    let (min_y, max_y) = (stats.min_y as i32, stats.max_y as i32);

    let mut start: Option<(i32, i32)> = None;
    'scan: for y in min_y..=max_y {
        for x in min_x..=max_x {
            if is_label(field, x, y, label) {
                start = Some((x, y));
                break 'scan;
            }
        }
    }
    let Some(start) = start else {
        return Vec::new();
    };

    // Single-pixel component: no ring to trace.
    if stats.count == 1 {
        return vec![Point::new(start.0 as f64, start.1 as f64)];
    }

    let mut current = start;
    let mut backtrack = (start.0 - 1, start.1);
    let mut polygon: Vec<Point> = vec![Point::new(current.0 as f64, current.1 as f64)];

    let max_iters = 4 * field.width * field.height + 8;
    let mut iters = 0usize;

    loop {
        iters += 1;
        if iters > max_iters {
            break;
        }

        let dir_of_backtrack = NEIGHBORS
            .iter()
            .position(|&(dx, dy)| (current.0 + dx, current.1 + dy) == backtrack)
            .unwrap_or(6);

        let mut found = None;
        for step in 1..=8 {
            let dir = (dir_of_backtrack + step) % 8;
            let (dx, dy) = NEIGHBORS[dir];
            let candidate = (current.0 + dx, current.1 + dy);
            if is_label(field, candidate.0, candidate.1, label) {
                found = Some(candidate);
                break;
            }
        }

        let Some(next) = found else {
            break;
        };

        let new_backtrack = current;
        current = next;
        backtrack = new_backtrack;

        push_collinear_aware(&mut polygon, Point::new(current.0 as f64, current.1 as f64));

        if current == start && backtrack == (start.0 - 1, start.1) {
            break;
        }
    }

    if polygon.len() > 1 {
        let first = polygon[0];
        let last = polygon[polygon.len() - 1];
        if first.x == last.x && first.y == last.y {
            polygon.pop();
        }
    }

    polygon
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::connected_components;

    fn mask_from(rows: &[&str]) -> (Vec<bool>, usize, usize) {
        let height = rows.len();
        let width = rows[0].len();
        let mut mask = vec![false; width * height];
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                mask[y * width + x] = c == '#';
            }
        }
        (mask, width, height)
    }

    #[test]
    fn invalid_label_returns_empty() {
        let (mask, w, h) = mask_from(&[".#.", "###", ".#."]);
        let (stats, field) = connected_components(&mask, w, h);
        assert!(trace_contour(&field, &stats[0], 0).is_empty());
        assert!(trace_contour(&field, &stats[0], -1).is_empty());
    }

    #[test]
    fn single_pixel_yields_one_vertex() {
        let (mask, w, h) = mask_from(&["...", ".#.", "..."]);
        let (stats, field) = connected_components(&mask, w, h);
        let poly = trace_contour(&field, &stats[0], 1);
        assert_eq!(poly.len(), 1);
    }

    #[test]
    fn square_block_traces_to_four_corners() {
        let (mask, w, h) = mask_from(&["####", "####", "####", "####"]);
        let (stats, field) = connected_components(&mask, w, h);
        let poly = trace_contour(&field, &stats[0], 1);
        assert!(poly.len() >= 4);
        for p in &poly {
            assert!(p.x >= 0.0 && p.x < w as f64);
            assert!(p.y >= 0.0 && p.y < h as f64);
        }
    }

    #[test]
    fn l_shape_has_more_than_four_vertices() {
        let rows = [
            "#.........",
            "#.........",
            "#.........",
            "###########",
            "###########",
        ];
        let (mask, w, h) = mask_from(&rows);
        let (stats, field) = connected_components(&mask, w, h);
        let poly = trace_contour(&field, &stats[0], 1);
        assert!(poly.len() > 4);
    }

    #[test]
    fn no_trailing_duplicate_of_first_vertex() {
        let (mask, w, h) = mask_from(&["####", "####", "####", "####"]);
        let (stats, field) = connected_components(&mask, w, h);
        let poly = trace_contour(&field, &stats[0], 1);
        let first = poly[0];
        let last = poly[poly.len() - 1];
        assert!(first.x != last.x || first.y != last.y);
    }
}
