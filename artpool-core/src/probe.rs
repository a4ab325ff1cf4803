//! Header-only image inspection: container format and pixel dimensions.

use std::io::Cursor;

use artpool_model::ImageDimensions;
use image::{ImageFormat, ImageReader};

use crate::error::{PoolError, Result};

/// What the first bytes of a downloaded file say about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbedImage {
    pub format: ImageFormat,
    /// `None` when the header is truncated or the format does not expose
    /// dimensions up front.
    pub dimensions: Option<ImageDimensions>,
}

impl ProbedImage {
    pub fn extension(&self) -> &'static str {
        extension_for(self.format)
    }
}

/// Identify the container and read dimensions without decoding pixels.
///
/// Fails only when the bytes are not a recognisable image at all (error
/// pages served with a 200, truncated responses).
pub fn probe(bytes: &[u8]) -> Result<ProbedImage> {
    let format = image::guess_format(bytes).map_err(|err| {
        PoolError::InvalidMedia(format!("unrecognised image data: {err}"))
    })?;

    let dimensions = ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .ok()
        .and_then(|dims| ImageDimensions::try_from(dims).ok());

    Ok(ProbedImage { format, dimensions })
}

pub fn extension_for(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("jpg")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::new_rgb8(width, height)
            .write_to(&mut out, ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn reads_png_dimensions_from_the_header() {
        let probed = probe(&tiny_png(68, 100)).unwrap();
        assert_eq!(probed.format, ImageFormat::Png);
        assert_eq!(probed.extension(), "png");
        let dims = probed.dimensions.map(|d| (d.width_u32(), d.height_u32()));
        assert_eq!(dims, Some((68, 100)));
    }

    #[test]
    fn rejects_non_image_payloads() {
        assert!(probe(b"<!DOCTYPE html><html></html>").is_err());
    }

    #[test]
    fn jpeg_magic_without_a_full_header_has_unknown_dimensions() {
        let probed = probe(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0]).unwrap();
        assert_eq!(probed.format, ImageFormat::Jpeg);
        assert_eq!(probed.extension(), "jpg");
        assert_eq!(probed.dimensions, None);
    }
}
