use thiserror::Error;

/// Errors surfaced by the tree, the clustering algorithms and the worker pool
///
/// Degenerate but valid outcomes (no clusters, all noise, singleton clusters)
/// are never reported through this type.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClusterError {
    /// A tree was requested with zero dimensions
    #[error("dimensionality must be at least 1")]
    InvalidDimension,

    /// A point does not have the dimensionality of the tree / dataset
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// Flat coordinate buffer that cannot be split into rows of `dim`
    #[error("flat buffer of length {len} is not a multiple of dimension {dim}")]
    RaggedInput { len: usize, dim: usize },

    /// NaN or infinite coordinate in the input
    #[error("non-finite coordinate at point {point}, dimension {dim}")]
    NonFiniteCoordinate { point: usize, dim: usize },

    /// Payload sequence does not line up with the points
    #[error("got {payloads} payloads for {points} points")]
    PayloadMismatch { points: usize, payloads: usize },

    /// Distance matrix input that is not n x n
    #[error("distance matrix must be square, got {rows} x {cols}")]
    NonSquareDistanceMatrix { rows: usize, cols: usize },

    /// Parameter outside of its valid domain
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// More clusters requested than there are points
    #[error("cannot produce {requested} clusters from {available} points")]
    UnreachableClusterCount { requested: usize, available: usize },

    /// A job submitted to the worker pool panicked
    #[error("task {id} panicked: {message}")]
    TaskPanicked { id: usize, message: String },
}

/// Crate result alias
pub type Result<T> = std::result::Result<T, ClusterError>;
