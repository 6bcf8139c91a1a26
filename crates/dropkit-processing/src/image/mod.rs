//! Image decoding, recompression and resizing.

mod transformer;

pub use transformer::{ImageSettings, ImageTransformer};

use image::error::{ImageError, LimitErrorKind};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

use crate::traits::{CodecError, CodecResult, ImageCodec};
use dropkit_core::ConversionCause;

/// Extensions whose bytes are raster images this crate can decode.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

pub fn is_image_name(file_name: &str) -> bool {
    dropkit_core::format::extension_of(file_name)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Decoder backed by the `image` crate, sniffing the container from content.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardImageCodec;

impl ImageCodec for StandardImageCodec {
    fn decode(&self, data: &[u8]) -> CodecResult<(DynamicImage, ImageFormat)> {
        let reader = image::ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| CodecError::corrupt(format!("Failed to read image: {}", e)))?;
        let format = reader
            .format()
            .ok_or_else(|| CodecError::corrupt("Unrecognized image data"))?;
        let img = reader.decode().map_err(map_image_error)?;
        Ok((img, format))
    }
}

fn map_image_error(err: ImageError) -> CodecError {
    let cause = match &err {
        ImageError::Decoding(_) | ImageError::IoError(_) => ConversionCause::Corrupt,
        ImageError::Unsupported(_) => ConversionCause::Unsupported,
        ImageError::Limits(limit) => match limit.kind() {
            LimitErrorKind::InsufficientMemory | LimitErrorKind::DimensionError => {
                ConversionCause::ResourceExhausted
            }
            _ => ConversionCause::Unsupported,
        },
        _ => ConversionCause::Codec,
    };
    CodecError::new(cause, format!("Failed to decode image: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_garbage() {
        let err = StandardImageCodec
            .decode(b"definitely not an image")
            .unwrap_err();
        assert_eq!(err.cause, ConversionCause::Corrupt);
    }

    #[test]
    fn test_decode_truncated_png_is_corrupt() {
        let mut png = Vec::new();
        DynamicImage::new_rgb8(8, 8)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        png.truncate(png.len() / 2);
        let err = StandardImageCodec.decode(&png).unwrap_err();
        assert_eq!(err.cause, ConversionCause::Corrupt);
    }

    #[test]
    fn test_is_image_name() {
        assert!(is_image_name("a.PNG"));
        assert!(is_image_name("a.webp"));
        assert!(!is_image_name("a.pdf"));
        assert!(!is_image_name("png"));
    }
}
