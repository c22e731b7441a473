//! Mesh error types.

use std::path::PathBuf;

use polyptych_math::MathError;

/// Errors from building, validating, reading, or writing a polyhedron.
#[derive(Debug, thiserror::Error)]
pub enum HedronError {
    /// Failed to read or write a mesh file.
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file contents did not match any readable format.
    #[error("unrecognized polyhedron format in {0}")]
    UnrecognizedFormat(PathBuf),

    /// A format name or file extension was not recognized.
    #[error("unknown polyhedron format {0:?}")]
    UnknownFormatName(String),

    /// The format can be written but not read.
    #[error("{0} files cannot be read")]
    NotReadable(&'static str),

    /// The header of a file was missing or malformed.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// A line of a text format could not be parsed.
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A recorded length did not match the data actually present.
    #[error("{what}: byte length {expected} recorded, {actual} present")]
    ByteLengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A face has fewer than three vertices.
    #[error("face {face} has only {count} vertices")]
    TooFewVertices { face: usize, count: usize },

    /// A face references a vertex that does not exist.
    #[error("face {face} references vertex {vertex}, but there are {count} vertices")]
    VertexOutOfRange {
        face: usize,
        vertex: usize,
        count: usize,
    },

    /// A face index was out of range.
    #[error("no face {0}")]
    InvalidFace(usize),

    /// More than two faces share one edge.
    #[error("edge {v0}-{v1} is shared by {count} faces")]
    NonManifoldEdge { v0: usize, v1: usize, count: usize },

    /// Two faces share more than one edge.
    #[error("faces {a} and {b} share more than one edge")]
    MultipleSharedEdges { a: usize, b: usize },

    /// Adjacency is not symmetric.
    #[error("face {face} edge {edge} links to face {other}, which does not link back")]
    AsymmetricAdjacency {
        face: usize,
        edge: usize,
        other: usize,
    },

    /// A face is too degenerate to build a basis.
    #[error("degenerate geometry on face {face}: {source}")]
    DegenerateGeometry {
        face: usize,
        #[source]
        source: MathError,
    },

    /// The mesh has nothing to write.
    #[error("polyhedron has no {0}")]
    Empty(&'static str),

    /// Refused to overwrite an existing file.
    #[error("{0} exists; pass clobber to overwrite")]
    FileExists(PathBuf),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HedronError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}
