//! crystio-io: File I/O for crystallographic data formats.
//!
//! This crate provides:
//! - Memory-mapped file reading
//! - The format registry and content-based format selection
//! - PNG and (with the `hdf5` feature) HDF5 detector image readers
//! - Density map writers
//! - JSON import configuration
//!

pub mod config;
#[cfg(feature = "hdf5")]
pub mod container;
mod error;
pub mod formats;
pub mod png;
pub mod reader;
pub mod writer;

pub use config::{ImageConfig, ImportConfig, QStepConfig};
#[cfg(feature = "hdf5")]
pub use container::{ContainerImage, ContainerScan, ContainerSession};
pub use error::{Error, Result};
pub use formats::{
    Direction, FormatInfo, FormatKind, FormatRegistry, ImageImport, Imported, MapImport,
    SeriesImport,
};
pub use png::decode_png;
pub use reader::MappedFileReader;
pub use writer::MapFileWriter;
