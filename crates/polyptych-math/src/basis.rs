//! Orthonormal 3D frame used to flatten a planar face into 2D.

use glam::{DVec2, DVec3};

use crate::error::MathError;

const AXIS_EPSILON: f64 = 1e-12;

/// A 3D frame with origin `p` and axes `x`, `y`, `z`.
///
/// Faces use `z` as their outward normal, so `x × y = z`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Basis {
    pub p: DVec3,
    pub x: DVec3,
    pub y: DVec3,
    pub z: DVec3,
}

impl Default for Basis {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Basis {
    pub const IDENTITY: Self = Self {
        p: DVec3::ZERO,
        x: DVec3::X,
        y: DVec3::Y,
        z: DVec3::Z,
    };

    /// Build the frame at `origin` whose x axis points at `toward_x` and whose
    /// y axis lies in the plane containing `in_plane`.
    pub fn from_points(
        origin: DVec3,
        toward_x: DVec3,
        in_plane: DVec3,
    ) -> Result<Self, MathError> {
        let x = toward_x - origin;
        let length = x.length();
        if !length.is_finite() || length < AXIS_EPSILON {
            return Err(MathError::DegenerateSegment { length });
        }
        let x = x / length;
        let z = x.cross(in_plane - origin);
        let length = z.length();
        if !length.is_finite() || length < AXIS_EPSILON {
            return Err(MathError::DegenerateSegment { length });
        }
        let z = z / length;
        Ok(Self {
            p: origin,
            x,
            y: z.cross(x),
            z,
        })
    }

    /// Coordinates of `point` in the frame's xy plane.
    #[must_use]
    pub fn flatten(&self, point: DVec3) -> DVec2 {
        let d = point - self.p;
        DVec2::new(d.dot(self.x), d.dot(self.y))
    }

    /// Full frame-relative coordinates of `point`.
    #[must_use]
    pub fn to_local(&self, point: DVec3) -> DVec3 {
        let d = point - self.p;
        DVec3::new(d.dot(self.x), d.dot(self.y), d.dot(self.z))
    }

    /// The 3D point at frame coordinate `(u, v, 0)`.
    #[must_use]
    pub fn unflatten(&self, uv: DVec2) -> DVec3 {
        self.p + self.x * uv.x + self.y * uv.y
    }

    #[must_use]
    pub fn is_orthonormal(&self, epsilon: f64) -> bool {
        [self.x, self.y, self.z]
            .iter()
            .all(|a| (a.length() - 1.0).abs() <= epsilon)
            && self.x.dot(self.y).abs() <= epsilon
            && self.y.dot(self.z).abs() <= epsilon
            && self.z.dot(self.x).abs() <= epsilon
    }
}
