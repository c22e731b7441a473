//! Nets: polyhedron faces unfolded flat into the plane.
//!
//! A [`Net`] places copies of mesh faces with rigid 2D transforms, hinged
//! edge to edge from a seed face. [`Unfolding`] owns the polyhedron together
//! with every net built on it and brokers the operations that touch more than
//! one net (claiming faces, merging). [`Project`] saves and restores a whole
//! session.

mod error;
mod net;
mod project;
mod unfolding;

pub use error::NetError;
pub use net::{EdgeStyle, EdgeTag, FaceTag, Hinge, Net, NetFace, NetFaceEdge, NetLine, PaperBinding};
pub use project::{PROJECT_HEADER, Project};
pub use unfolding::Unfolding;
