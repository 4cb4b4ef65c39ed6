use std::io::Cursor;

use image::ImageReader;

use crate::error::DimensionError;
use crate::models::{Dimensions, ImageRef};

/// Reads the intrinsic size of an encoded image from its header.
///
/// Only the header is parsed; pixel data is never decoded.
pub fn read_dimensions(image: &ImageRef, bytes: &[u8]) -> Result<Dimensions, DimensionError> {
    let decode_err = |reason: String| DimensionError::Decode {
        image: image.to_string(),
        reason,
    };

    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| decode_err(e.to_string()))?
        .into_dimensions()
        .map_err(|e| decode_err(e.to_string()))?;

    if width == 0 || height == 0 {
        return Err(DimensionError::ZeroSized {
            image: image.to_string(),
        });
    }

    Ok(Dimensions { width, height })
}

#[cfg(test)]
pub(crate) fn encode_png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image::RgbImage::new(width, height)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}
