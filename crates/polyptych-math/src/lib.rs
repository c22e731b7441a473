//! Planar and spatial math for polyptych: the 2D affine transform used to place
//! net faces, the 3D face basis used to flatten them, bounds, and polygon tests.

mod basis;
mod bounds;
mod error;
mod polygon;
mod transform;

pub use basis::Basis;
pub use bounds::Bounds2;
pub use error::MathError;
pub use polygon::{
    centroid, contains_point, convex_polygons_overlap, distance_to_boundary, segment_distance,
    signed_area,
};
pub use transform::Transform2;

/// Re-exported so downstream crates share one vector type.
pub use glam::{DVec2, DVec3};
