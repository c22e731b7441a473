//! Render error types.

use std::path::PathBuf;

use polyptych_config::OutputFormat;
use polyptych_hedron::HedronError;
use polyptych_math::MathError;
use polyptych_net::NetError;

use crate::error_log::ErrorLog;

/// Errors that stop a render. Failures of single faces are recorded in the
/// [`ErrorLog`] instead.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("image error on {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The layout format is recognized but not produced.
    #[error("{0:?} output is not supported")]
    UnsupportedFormat(OutputFormat),

    #[error("invalid render settings: {0}")]
    InvalidSettings(String),

    /// The first face has no width to derive a pixel scale from.
    #[error("face {0} has no extent to scale from")]
    NoScale(usize),

    /// A face placement cannot be inverted.
    #[error("degenerate placement of face {face}: {source}")]
    Degenerate {
        face: usize,
        #[source]
        source: MathError,
    },

    /// The net has no actual faces to render.
    #[error("nothing to render")]
    Empty,

    /// The render was cancelled. Faces finished before that are in the log.
    #[error("render cancelled after {completed} faces")]
    Cancelled { completed: usize, log: ErrorLog },

    #[error(transparent)]
    Net(#[from] NetError),

    #[error(transparent)]
    Hedron(#[from] HedronError),
}
