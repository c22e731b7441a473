//! Polyhedron meshes for polyptych.
//!
//! A [`Polyhedron`] owns vertices and faces, derives edges and face adjacency,
//! and keeps a per-face cache ([`ExtraFace`]) recording flattened positions and
//! which net, if any, claims the face. The [`io`] module reads and writes the
//! supported mesh formats; [`shapes`] builds a few procedural meshes.

pub mod attribute;
mod error;
pub mod io;
mod ownership;
mod polyhedron;
pub mod shapes;

pub use error::HedronError;
pub use ownership::{NetId, Ownership};
pub use polyhedron::{Edge, ExtraFace, Face, FaceSet, Polyhedron};
