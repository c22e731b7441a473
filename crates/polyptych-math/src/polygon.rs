//! Planar polygon tests. Polygons are closed implicitly (last point joins the first).

use glam::DVec2;

/// Shoelace area, positive for counter-clockwise winding.
#[must_use]
pub fn signed_area(polygon: &[DVec2]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for (i, a) in polygon.iter().enumerate() {
        let b = polygon[(i + 1) % polygon.len()];
        sum += a.perp_dot(b);
    }
    sum * 0.5
}

/// Area centroid. Falls back to the vertex average for degenerate polygons.
#[must_use]
pub fn centroid(polygon: &[DVec2]) -> DVec2 {
    if polygon.is_empty() {
        return DVec2::ZERO;
    }
    let area = signed_area(polygon);
    if area.abs() < 1e-15 {
        return polygon.iter().copied().sum::<DVec2>() / polygon.len() as f64;
    }
    let mut c = DVec2::ZERO;
    for (i, a) in polygon.iter().enumerate() {
        let b = polygon[(i + 1) % polygon.len()];
        c += (*a + b) * a.perp_dot(b);
    }
    c / (6.0 * area)
}

/// Even-odd point-in-polygon test. Points exactly on the boundary may go either way.
#[must_use]
pub fn contains_point(polygon: &[DVec2], p: DVec2) -> bool {
    let mut inside = false;
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Distance from `p` to the segment `a → b`.
#[must_use]
pub fn segment_distance(p: DVec2, a: DVec2, b: DVec2) -> f64 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Distance from `p` to the nearest polygon edge.
#[must_use]
pub fn distance_to_boundary(polygon: &[DVec2], p: DVec2) -> f64 {
    let n = polygon.len();
    (0..n)
        .map(|i| segment_distance(p, polygon[i], polygon[(i + 1) % n]))
        .fold(f64::INFINITY, f64::min)
}

/// Separating-axis overlap test for convex polygons.
///
/// Polygons that only touch along an edge or at a vertex, or that
/// interpenetrate by less than `epsilon`, do not overlap.
#[must_use]
pub fn convex_polygons_overlap(a: &[DVec2], b: &[DVec2], epsilon: f64) -> bool {
    if a.len() < 3 || b.len() < 3 {
        return false;
    }
    for polygon in [a, b] {
        let n = polygon.len();
        for i in 0..n {
            let edge = polygon[(i + 1) % n] - polygon[i];
            let Some(axis) = edge.perp().try_normalize() else {
                continue;
            };
            let (a_min, a_max) = project(a, axis);
            let (b_min, b_max) = project(b, axis);
            if a_max - b_min <= epsilon || b_max - a_min <= epsilon {
                return false;
            }
        }
    }
    true
}

fn project(polygon: &[DVec2], axis: DVec2) -> (f64, f64) {
    polygon
        .iter()
        .map(|p| p.dot(axis))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| {
            (lo.min(d), hi.max(d))
        })
}
