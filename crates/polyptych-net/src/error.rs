//! Net error types.

use std::path::PathBuf;

use polyptych_hedron::{HedronError, NetId};
use polyptych_math::MathError;

/// Errors from net operations and project files.
///
/// Net operations do not roll back: when one fails partway, the net keeps
/// whatever changes were already made.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// No net face with this index.
    #[error("no net face {0}")]
    InvalidNetFace(usize),

    /// No net with this id in the session.
    #[error("no net {0}")]
    InvalidNet(NetId),

    /// Edge index out of range for a net face.
    #[error("net face {face} has no edge {edge}")]
    InvalidEdge { face: usize, edge: usize },

    /// The two mesh faces share no edge.
    #[error("faces {a} and {b} are not adjacent")]
    NotAdjacent { a: usize, b: usize },

    /// The mesh face already belongs to another net.
    #[error("face {face} is claimed by {owner}")]
    FaceClaimed { face: usize, owner: NetId },

    /// The mesh face is already laid down in this net.
    #[error("face {0} is already placed in this net")]
    AlreadyPlaced(usize),

    /// The mesh face is not laid down in this net.
    #[error("face {0} is not placed in this net")]
    NotPlaced(usize),

    /// The operation needs an actual net face.
    #[error("net face {0} is not actual")]
    NotActual(usize),

    /// The operation needs a potential or taken net face.
    #[error("net face {0} is actual")]
    IsActual(usize),

    /// The seed cannot be picked up; reseed first.
    #[error("face {0} is the seed of its net")]
    SeedPickUp(usize),

    /// Nothing can be unfolded across a mesh boundary or mesh cut.
    #[error("edge {edge} of face {face} is a boundary or cut")]
    Boundary { face: usize, edge: usize },

    /// The net has no seed yet.
    #[error("{0} has no seed")]
    NotAnchored(NetId),

    /// The net already has a different seed.
    #[error("{net} is already anchored at face {seed}")]
    AlreadyAnchored { net: NetId, seed: usize },

    /// A placement transform could not be built or inverted.
    #[error("degenerate geometry at face {face}: {source}")]
    Degenerate {
        face: usize,
        #[source]
        source: MathError,
    },

    /// Face ownership or net membership disagree.
    #[error("inconsistent nets: {0}")]
    Inconsistent(String),

    /// A project file line could not be understood.
    #[error("project line {line}: {message}")]
    Project { line: usize, message: String },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Hedron(#[from] HedronError),
}

impl NetError {
    pub(crate) fn project(line: usize, message: impl Into<String>) -> Self {
        NetError::Project {
            line,
            message: message.into(),
        }
    }
}
