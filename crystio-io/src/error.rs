//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Memory mapping error.
    #[error("memory mapping error: {0}")]
    MmapError(String),

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// More than one format accepted the file.
    #[error("ambiguous format, candidates: {}", candidates.join(", "))]
    AmbiguousFormat { candidates: Vec<String> },

    /// No registered format accepted the file.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The format exists but its decoder was not built in.
    #[error("format unavailable: {0}")]
    FormatUnavailable(String),

    /// Image decoding error.
    #[error("image decoding error: {0}")]
    Image(#[from] image::ImageError),

    /// Configuration parsing error.
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// HDF5 library error.
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] crystio_core::Error),
}
