//! PNG detector images.
//!
//! The only known source is converted CheMin frames, so geometry defaults
//! come from that instrument unless configured otherwise.

use crate::{Error, Result};
use crystio_core::{Comment, ImageBuffer, ImageDefaults};
use image::DynamicImage;
use ndarray::Array2;

/// Decodes a PNG into a grayscale intensity image.
///
/// 16-bit grayscale keeps its full range; anything else is flattened to
/// 8-bit luma.
///
/// # Errors
/// Returns an error if the bytes cannot be decoded or hold no pixels.
pub fn decode_png(bytes: &[u8], defaults: &ImageDefaults) -> Result<ImageBuffer> {
    let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)?;
    let data = luma_array(&img)?;
    let image = ImageBuffer::new(data, defaults, vec![Comment::new("no metadata")])?;
    log::debug!(
        "Decoded PNG image {}x{}",
        image.metadata.size.0,
        image.metadata.size.1
    );
    Ok(image)
}

fn luma_array(img: &DynamicImage) -> Result<Array2<f64>> {
    let shape = (img.height() as usize, img.width() as usize);
    let values: Vec<f64> = match img {
        DynamicImage::ImageLuma16(buf) => buf.pixels().map(|p| f64::from(p[0])).collect(),
        other => other.to_luma8().pixels().map(|p| f64::from(p[0])).collect(),
    };
    Array2::from_shape_vec(shape, values)
        .map_err(|e| Error::InvalidFormat(format!("PNG pixel buffer: {e}")))
}
