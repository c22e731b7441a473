//! Math error types.

/// Errors from transform and basis construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MathError {
    /// The transform has a (near) zero determinant and cannot be inverted.
    #[error("singular transform (determinant {determinant})")]
    SingularTransform { determinant: f64 },

    /// A segment or axis had (near) zero length.
    #[error("degenerate segment of length {length}")]
    DegenerateSegment { length: f64 },
}
