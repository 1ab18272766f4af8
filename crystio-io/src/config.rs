//! Import configuration.
//!
//! Every section and field is optional in JSON; missing values fall back to
//! the built-in instrument defaults.
//!
//! ```json
//! {
//!   "q_step": { "wavelength": 1.5406, "temperature": 295.0 },
//!   "png":    { "wavelength": 1.78892, "pixel_size": [40.0, 40.0], "distance": 18.0 },
//!   "hdf5":   { "distance": 350.0 }
//! }
//! ```

use crate::Result;
use crystio_core::records::{RecordDefaults, DEFAULT_TEMPERATURE, DEFAULT_WAVELENGTH};
use crystio_core::ImageDefaults;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Defaults for the numeric text readers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QStepConfig {
    /// Wavelength (Å) when no `wave` header is present.
    pub wavelength: f64,
    /// Temperature (K) when no `Temp` header parses.
    pub temperature: f64,
}

impl Default for QStepConfig {
    fn default() -> Self {
        Self {
            wavelength: DEFAULT_WAVELENGTH,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl QStepConfig {
    /// Converts to the parser's defaults.
    #[must_use]
    pub fn record_defaults(&self) -> RecordDefaults {
        RecordDefaults {
            wavelength: self.wavelength,
            temperature: self.temperature,
        }
    }
}

/// Geometry defaults for an image format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Wavelength in Å.
    pub wavelength: f64,
    /// Pixel pitch (x, y) in µm.
    pub pixel_size: (f64, f64),
    /// Sample to detector distance in mm.
    pub distance: f64,
}

impl From<ImageDefaults> for ImageConfig {
    fn from(d: ImageDefaults) -> Self {
        Self {
            wavelength: d.wavelength,
            pixel_size: d.pixel_size,
            distance: d.distance,
        }
    }
}

impl ImageConfig {
    /// Converts to image defaults.
    #[must_use]
    pub fn image_defaults(&self) -> ImageDefaults {
        ImageDefaults {
            wavelength: self.wavelength,
            pixel_size: self.pixel_size,
            distance: self.distance,
        }
    }
}

/// Configuration for all importers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImportConfig {
    pub q_step: QStepConfig,
    pub png: ImageConfig,
    pub hdf5: ImageConfig,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            q_step: QStepConfig::default(),
            png: ImageDefaults::CHEMIN.into(),
            hdf5: ImageDefaults::AREA_DETECTOR.into(),
        }
    }
}

// Partial image sections are merged onto per-format defaults, which differ
// between PNG and HDF5, so they cannot use a single `#[serde(default)]`.
#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonImage {
    wavelength: Option<f64>,
    pixel_size: Option<(f64, f64)>,
    distance: Option<f64>,
}

impl JsonImage {
    fn merge(self, base: ImageDefaults) -> ImageConfig {
        ImageConfig {
            wavelength: self.wavelength.unwrap_or(base.wavelength),
            pixel_size: self.pixel_size.unwrap_or(base.pixel_size),
            distance: self.distance.unwrap_or(base.distance),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonConfig {
    q_step: QStepConfig,
    png: JsonImage,
    hdf5: JsonImage,
}

impl ImportConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let json_config: JsonConfig = serde_json::from_reader(reader)?;
        Ok(Self::from_json_config(json_config))
    }

    /// Load configuration from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the string is not valid JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let json_config: JsonConfig = serde_json::from_str(json)?;
        Ok(Self::from_json_config(json_config))
    }

    fn from_json_config(config: JsonConfig) -> Self {
        Self {
            q_step: config.q_step,
            png: config.png.merge(ImageDefaults::CHEMIN),
            hdf5: config.hdf5.merge(ImageDefaults::AREA_DETECTOR),
        }
    }
}
