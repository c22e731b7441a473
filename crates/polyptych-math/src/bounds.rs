use glam::DVec2;

/// Axis-aligned 2D bounding box.
///
/// An empty box has `min > max`; adding the first point makes it a point box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds2 {
    pub min: DVec2,
    pub max: DVec2,
}

impl Default for Bounds2 {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Bounds2 {
    pub const EMPTY: Self = Self {
        min: DVec2::splat(f64::INFINITY),
        max: DVec2::splat(f64::NEG_INFINITY),
    };

    /// Create a box from two corners, sorting components so min <= max.
    #[must_use]
    pub fn new(a: DVec2, b: DVec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Smallest box containing every point.
    pub fn from_points<I: IntoIterator<Item = DVec2>>(points: I) -> Self {
        let mut bounds = Self::EMPTY;
        for p in points {
            bounds.add_point(p);
        }
        bounds
    }

    pub fn add_point(&mut self, p: DVec2) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        if self.is_empty() { 0.0 } else { self.max.x - self.min.x }
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        if self.is_empty() { 0.0 } else { self.max.y - self.min.y }
    }

    #[must_use]
    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    /// Returns true if the point lies inside or on the boundary.
    #[must_use]
    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Returns the smallest box enclosing both.
    #[must_use]
    pub fn union(&self, other: &Bounds2) -> Bounds2 {
        Bounds2 {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Grow the box by `margin` on every side.
    #[must_use]
    pub fn expanded(&self, margin: f64) -> Bounds2 {
        if self.is_empty() {
            return *self;
        }
        Bounds2 {
            min: self.min - DVec2::splat(margin),
            max: self.max + DVec2::splat(margin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sorts_corners() {
        let b = Bounds2::new(DVec2::new(3.0, -1.0), DVec2::new(-2.0, 4.0));
        assert_eq!(b.min, DVec2::new(-2.0, -1.0));
        assert_eq!(b.max, DVec2::new(3.0, 4.0));
        assert_eq!(b.width(), 5.0);
        assert_eq!(b.height(), 5.0);
    }

    #[test]
    fn test_empty_until_point_added() {
        let mut b = Bounds2::EMPTY;
        assert!(b.is_empty());
        assert_eq!(b.width(), 0.0);
        b.add_point(DVec2::new(1.0, 2.0));
        assert!(!b.is_empty());
        assert!(b.contains(DVec2::new(1.0, 2.0)));
    }

    #[test]
    fn test_union_and_expand() {
        let a = Bounds2::from_points([DVec2::ZERO, DVec2::ONE]);
        let b = Bounds2::from_points([DVec2::new(2.0, -1.0)]);
        let u = a.union(&b).expanded(0.5);
        assert_eq!(u.min, DVec2::new(-0.5, -1.5));
        assert_eq!(u.max, DVec2::new(2.5, 1.5));
    }
}
