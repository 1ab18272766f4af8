//! Detector images and their sidecar geometry.

use crate::series::Comment;
use crate::{Error, Result};
use ndarray::Array2;

/// Geometry defaults for a detector family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageDefaults {
    /// Wavelength in Å.
    pub wavelength: f64,
    /// Pixel pitch (x, y) in µm.
    pub pixel_size: (f64, f64),
    /// Sample to detector distance in mm.
    pub distance: f64,
}

impl ImageDefaults {
    /// CheMin (Mars rover) diffractometer, the only known PNG source.
    pub const CHEMIN: Self = Self {
        wavelength: 1.78892,
        pixel_size: (40.0, 40.0),
        distance: 18.0,
    };

    /// Synchrotron area detector typical of HDF5 image files.
    pub const AREA_DETECTOR: Self = Self {
        wavelength: 0.15,
        pixel_size: (74.8, 74.8),
        distance: 1000.0,
    };
}

/// Geometry attached to one image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMetadata {
    /// Pixel pitch (x, y) in µm.
    pub pixel_size: (f64, f64),
    /// Wavelength in Å.
    pub wavelength: f64,
    /// Sample to detector distance in mm.
    pub distance: f64,
    /// Beam center (x, y) in mm.
    pub center: (f64, f64),
    /// Image shape (rows, columns).
    pub size: (usize, usize),
}

impl ImageMetadata {
    /// Seeds metadata for an image of `size` pixels.
    ///
    /// The center defaults to half of the physical detector extent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn with_defaults(size: (usize, usize), defaults: &ImageDefaults) -> Self {
        let center = (
            size.0 as f64 * defaults.pixel_size.0 / 2000.0,
            size.1 as f64 * defaults.pixel_size.1 / 2000.0,
        );
        Self {
            pixel_size: defaults.pixel_size,
            wavelength: defaults.wavelength,
            distance: defaults.distance,
            center,
            size,
        }
    }

    /// Overrides fields from `name: value` header lines.
    ///
    /// Names are matched by substring. Pixel sizes are given in mm and
    /// stored in µm. Wavelength spread entries are ignored. Values that do
    /// not parse leave the field unchanged.
    pub fn apply_header(&mut self, header: &[Comment]) {
        for line in header {
            let Some((name, value)) = line.as_str().split_once(':') else {
                continue;
            };
            let Ok(value) = value.trim().parse::<f64>() else {
                continue;
            };
            if name.contains("wavelength") {
                if !name.contains("spread") {
                    self.wavelength = value;
                }
            } else if name.contains("distance") {
                self.distance = value;
            } else if name.contains("x_pixel_size") {
                self.pixel_size.0 = value * 1000.0;
            } else if name.contains("y_pixel_size") {
                self.pixel_size.1 = value * 1000.0;
            } else if name.contains("beam_center_x") {
                self.center.0 = value;
            } else if name.contains("beam_center_y") {
                self.center.1 = value;
            }
        }
    }
}

/// A 2-D intensity image with geometry and header text.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    /// Intensities indexed `[row, column]`.
    pub data: Array2<f64>,
    pub metadata: ImageMetadata,
    pub comments: Vec<Comment>,
}

impl ImageBuffer {
    /// Wraps pixel data, seeding metadata from `defaults` and `comments`.
    ///
    /// # Errors
    /// Returns [`Error::NoData`] for an image without pixels.
    pub fn new(data: Array2<f64>, defaults: &ImageDefaults, comments: Vec<Comment>) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::NoData("No valid images found in file".to_string()));
        }
        let mut metadata = ImageMetadata::with_defaults(data.dim(), defaults);
        metadata.apply_header(&comments);
        Ok(Self {
            data,
            metadata,
            comments,
        })
    }

    /// Number of pixels.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_center_defaults_to_half_extent() {
        let meta = ImageMetadata::with_defaults((100, 50), &ImageDefaults::CHEMIN);
        assert_eq!(meta.size, (100, 50));
        assert_relative_eq!(meta.center.0, 2.0);
        assert_relative_eq!(meta.center.1, 1.0);
        assert_eq!(meta.wavelength, 1.78892);
    }

    #[test]
    fn test_header_overrides() {
        let mut meta = ImageMetadata::with_defaults((10, 10), &ImageDefaults::AREA_DETECTOR);
        let header = vec![
            Comment::new("/entry/instrument/wavelength_spread: 0.01"),
            Comment::new("/entry/instrument/wavelength: 0.1173"),
            Comment::new("/entry/instrument/detector/distance: 350.5"),
            Comment::new("/entry/instrument/detector/x_pixel_size: 0.172"),
            Comment::new("/entry/instrument/detector/y_pixel_size: 0.150"),
            Comment::new("/entry/instrument/detector/beam_center_x: 41.3"),
            Comment::new("/entry/instrument/detector/beam_center_y: garbage"),
            Comment::new("no separator"),
        ];
        meta.apply_header(&header);

        assert_eq!(meta.wavelength, 0.1173);
        assert_eq!(meta.distance, 350.5);
        assert_relative_eq!(meta.pixel_size.0, 172.0);
        assert_relative_eq!(meta.pixel_size.1, 150.0);
        assert_eq!(meta.center.0, 41.3);
        assert_relative_eq!(meta.center.1, 10.0 * 74.8 / 2000.0);
    }

    #[test]
    fn test_spread_alone_keeps_default_wavelength() {
        let mut meta = ImageMetadata::with_defaults((4, 4), &ImageDefaults::AREA_DETECTOR);
        meta.apply_header(&[Comment::new("/beam/wavelength_spread: 0.5")]);
        assert_eq!(meta.wavelength, 0.15);
    }

    #[test]
    fn test_image_buffer_size_matches_shape() {
        let image = ImageBuffer::new(Array2::zeros((3, 7)), &ImageDefaults::CHEMIN, Vec::new()).unwrap();
        assert_eq!(image.metadata.size, image.data.dim());
        assert_eq!(image.pixel_count(), 21);
    }

    #[test]
    fn test_empty_image_is_no_data() {
        let result = ImageBuffer::new(Array2::zeros((0, 5)), &ImageDefaults::CHEMIN, Vec::new());
        assert!(matches!(result, Err(Error::NoData(_))));
    }
}
