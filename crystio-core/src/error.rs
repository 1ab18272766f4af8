//! Error types for crystio-core.

use thiserror::Error;

/// Result type alias for crystio operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for crystio operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Content does not match the expected format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// The input was well-formed but held nothing usable.
    #[error("no data found: {0}")]
    NoData(String),

    /// Malformed density map header or payload.
    #[error("invalid map: {0}")]
    InvalidMap(String),

    /// Array shape disagrees with the declared extents.
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// 1-based image index outside the dataset index.
    #[error("image {index} out of range (container holds {count} images)")]
    ImageIndexOutOfRange { index: usize, count: usize },

    /// Dataset rank cannot hold an image.
    #[error("unexpected image dimensions for {path}: rank {rank}")]
    UnexpectedRank { path: String, rank: usize },
}
