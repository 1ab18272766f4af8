//! crystio-core: Core types and codecs for crystallographic data files.
//!
//! This crate provides the file-system-free half of the format plugins:
//! numeric text record parsing, content validators, detector image
//! metadata, the container image index, and density map codecs.
//!

pub mod dataset;
pub mod error;
pub mod image;
pub mod map;
pub mod records;
pub mod series;
pub mod validate;

pub use dataset::{DatasetEntry, DatasetIndex, ImageSelection};
pub use error::{Error, Result};
pub use image::{ImageBuffer, ImageDefaults, ImageMetadata};
pub use map::{decode_ccp4, encode_ccp4, encode_text, Ccp4Header, MapStatistics, MapTitle, VolumeMap};
pub use records::{LineError, ParsedRecords, RecordDefaults, RecordFormat, RecordPolicy};
pub use series::{Comment, InstrumentKind, NumericSeries};
