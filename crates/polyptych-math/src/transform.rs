//! 2×3 affine transform for placing flattened faces in net space.
//!
//! Transforms map column vectors: `apply(p) = A·p + t`. The six-element array
//! form is `[a, b, c, d, e, f]` with `x' = a·x + c·y + e` and `y' = b·x + d·y + f`,
//! which is the layout written to project and layout files.

use glam::{DAffine2, DMat2, DVec2};

use crate::error::MathError;

/// Determinants smaller than this are treated as singular.
const SINGULAR_EPSILON: f64 = 1e-12;

/// Segments shorter than this cannot define a rigid edge map.
const SEGMENT_EPSILON: f64 = 1e-12;

/// A 2D affine transform (linear part plus translation).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform2(DAffine2);

impl Default for Transform2 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform2 {
    pub const IDENTITY: Self = Self(DAffine2::IDENTITY);

    /// Build from the `[a, b, c, d, e, f]` array form.
    #[must_use]
    pub fn from_array(m: [f64; 6]) -> Self {
        Self(DAffine2::from_cols_array(&m))
    }

    /// The `[a, b, c, d, e, f]` array form.
    #[must_use]
    pub fn to_array(&self) -> [f64; 6] {
        self.0.to_cols_array()
    }

    #[must_use]
    pub fn from_translation(t: DVec2) -> Self {
        Self(DAffine2::from_translation(t))
    }

    /// Counter-clockwise rotation by `angle` radians about the origin.
    #[must_use]
    pub fn from_rotation(angle: f64) -> Self {
        Self(DAffine2::from_angle(angle))
    }

    #[must_use]
    pub fn from_scale(sx: f64, sy: f64) -> Self {
        Self(DAffine2::from_scale(DVec2::new(sx, sy)))
    }

    /// Build from the images of the x and y unit vectors and the origin.
    #[must_use]
    pub fn from_axes(x_axis: DVec2, y_axis: DVec2, origin: DVec2) -> Self {
        Self(DAffine2::from_mat2_translation(
            DMat2::from_cols(x_axis, y_axis),
            origin,
        ))
    }

    /// Apply `self` first, then `next`.
    #[must_use]
    pub fn then(&self, next: &Transform2) -> Transform2 {
        Transform2(next.0 * self.0)
    }

    /// Apply `inner` first, then `self`.
    #[must_use]
    pub fn compose(&self, inner: &Transform2) -> Transform2 {
        Transform2(self.0 * inner.0)
    }

    /// Full affine inverse. Fails when the linear part is singular.
    pub fn inverse(&self) -> Result<Transform2, MathError> {
        let determinant = self.determinant();
        if !determinant.is_finite() || determinant.abs() < SINGULAR_EPSILON {
            return Err(MathError::SingularTransform { determinant });
        }
        Ok(Transform2(self.0.inverse()))
    }

    #[must_use]
    pub fn determinant(&self) -> f64 {
        self.0.matrix2.determinant()
    }

    #[must_use]
    pub fn apply(&self, p: DVec2) -> DVec2 {
        self.0.transform_point2(p)
    }

    /// Apply only the linear part.
    #[must_use]
    pub fn apply_vector(&self, v: DVec2) -> DVec2 {
        self.0.transform_vector2(v)
    }

    #[must_use]
    pub fn x_axis(&self) -> DVec2 {
        self.0.matrix2.x_axis
    }

    #[must_use]
    pub fn y_axis(&self) -> DVec2 {
        self.0.matrix2.y_axis
    }

    #[must_use]
    pub fn origin(&self) -> DVec2 {
        self.0.translation
    }

    /// Whether the linear part is a rotation or reflection within `epsilon`.
    #[must_use]
    pub fn is_rigid(&self, epsilon: f64) -> bool {
        let x = self.x_axis();
        let y = self.y_axis();
        (x.length() - 1.0).abs() <= epsilon
            && (y.length() - 1.0).abs() <= epsilon
            && x.dot(y).abs() <= epsilon
    }

    /// Snap the linear part back to an orthonormal frame, keeping the x
    /// direction, the handedness and the translation.
    #[must_use]
    pub fn orthonormalized(&self) -> Transform2 {
        let x = self.x_axis().normalize_or_zero();
        if x == DVec2::ZERO {
            return *self;
        }
        let mut y = x.perp();
        if self.determinant() < 0.0 {
            y = -y;
        }
        Transform2::from_axes(x, y, self.origin())
    }

    /// Re-orthonormalize in place if drift exceeds `epsilon`. Returns whether
    /// anything changed.
    pub fn orthonormalize_if_drifted(&mut self, epsilon: f64) -> bool {
        if self.is_rigid(epsilon) {
            return false;
        }
        *self = self.orthonormalized();
        true
    }

    /// The rigid map (rotation plus translation) sending segment `src_a → src_b`
    /// onto the direction of `dst_a → dst_b`, with the midpoints coinciding.
    ///
    /// Segment lengths need not match exactly; only their directions are used.
    pub fn rigid_edge_map(
        src_a: DVec2,
        src_b: DVec2,
        dst_a: DVec2,
        dst_b: DVec2,
    ) -> Result<Transform2, MathError> {
        let src = src_b - src_a;
        let dst = dst_b - dst_a;
        for length in [src.length(), dst.length()] {
            if !length.is_finite() || length < SEGMENT_EPSILON {
                return Err(MathError::DegenerateSegment { length });
            }
        }
        let src = src.normalize();
        let dst = dst.normalize();
        // rotation taking src onto dst
        let cos = src.dot(dst);
        let sin = src.perp_dot(dst);
        let x_axis = DVec2::new(cos, sin);
        let y_axis = x_axis.perp();
        let rotation = Transform2::from_axes(x_axis, y_axis, DVec2::ZERO);
        let src_mid = (src_a + src_b) * 0.5;
        let dst_mid = (dst_a + dst_b) * 0.5;
        let translation = dst_mid - rotation.apply(src_mid);
        Ok(Transform2::from_axes(x_axis, y_axis, translation))
    }

    #[must_use]
    pub fn abs_diff_eq(&self, other: &Transform2, epsilon: f64) -> bool {
        self.0.abs_diff_eq(other.0, epsilon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-12;

    fn sample() -> Transform2 {
        Transform2::from_rotation(0.7).then(&Transform2::from_translation(DVec2::new(3.0, -2.0)))
    }

    #[test]
    fn test_array_layout_matches_affine_convention() {
        let t = Transform2::from_array([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let p = t.apply(DVec2::new(1.0, 1.0));
        // x' = a + c + e, y' = b + d + f
        assert_eq!(p, DVec2::new(9.0, 12.0));
        assert_eq!(t.to_array(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_then_applies_left_first() {
        let rotate = Transform2::from_rotation(std::f64::consts::FRAC_PI_2);
        let shift = Transform2::from_translation(DVec2::new(1.0, 0.0));
        let p = rotate.then(&shift).apply(DVec2::new(1.0, 0.0));
        assert!(
            (p - DVec2::new(1.0, 1.0)).length() < EPSILON,
            "rotate then shift gave {p:?}"
        );
        let q = shift.compose(&rotate).apply(DVec2::new(1.0, 0.0));
        assert!((p - q).length() < EPSILON);
    }

    #[test]
    fn test_composition_is_associative() {
        let a = sample();
        let b = Transform2::from_scale(2.0, 0.5);
        let c = Transform2::from_array([0.3, -1.2, 0.8, 0.4, 7.0, 1.0]);
        let left = a.then(&b).then(&c);
        let right = a.then(&b.then(&c));
        assert!(left.abs_diff_eq(&right, EPSILON));
    }

    #[test]
    fn test_inverse_round_trips() {
        let t = Transform2::from_array([0.3, -1.2, 0.8, 0.4, 7.0, 1.0]);
        let inv = t.inverse().unwrap();
        assert!(t.then(&inv).abs_diff_eq(&Transform2::IDENTITY, EPSILON));
        assert!(inv.then(&t).abs_diff_eq(&Transform2::IDENTITY, EPSILON));
    }

    #[test]
    fn test_singular_inverse_is_error() {
        let t = Transform2::from_array([1.0, 2.0, 2.0, 4.0, 0.0, 0.0]);
        assert!(matches!(
            t.inverse(),
            Err(MathError::SingularTransform { .. })
        ));
    }

    #[test]
    fn test_rigid_edge_map_reverses_shared_edge() {
        // the neighbouring face runs the shared edge the other way
        let m = Transform2::rigid_edge_map(
            DVec2::new(0.0, 0.0),
            DVec2::new(2.0, 0.0),
            DVec2::new(2.0, 0.0),
            DVec2::new(0.0, 0.0),
        )
        .unwrap();
        assert!(m.is_rigid(EPSILON));
        assert!((m.apply(DVec2::ZERO) - DVec2::new(2.0, 0.0)).length() < EPSILON);
        assert!((m.apply(DVec2::new(1.0, 1.0)) - DVec2::new(1.0, -1.0)).length() < EPSILON);
    }

    #[test]
    fn test_rigid_edge_map_rejects_degenerate() {
        let p = DVec2::new(1.0, 1.0);
        assert!(Transform2::rigid_edge_map(p, p, DVec2::ZERO, DVec2::X).is_err());
    }

    #[test]
    fn test_orthonormalize_removes_drift() {
        let mut t = Transform2::from_axes(
            DVec2::new(1.0 + 1e-6, 1e-7),
            DVec2::new(-2e-7, 0.999_999),
            DVec2::new(4.0, 5.0),
        );
        assert!(t.orthonormalize_if_drifted(1e-9));
        assert!(t.is_rigid(EPSILON));
        assert_eq!(t.origin(), DVec2::new(4.0, 5.0));
        assert!(!t.orthonormalize_if_drifted(1e-9));
    }
}
