// src/geometry.rs
//
// Box overlap shared by the slot and zone trackers.

use crate::types::Rect;

/// Intersection-over-union of two boxes, in `[0, 1]`.
///
/// Disjoint boxes and zero-area unions (degenerate calibration) score `0.0`.
pub fn overlap_ratio(a: &Rect, b: &Rect) -> f32 {
    let intersection = intersection_area(a, b);
    if intersection <= 0.0 {
        return 0.0;
    }

    let union = a.area() + b.area() - intersection;
    if union > 0.0 {
        (intersection / union).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn intersection_area(a: &Rect, b: &Rect) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    (x2 - x1).max(0.0) * (y2 - y1).max(0.0)
}
