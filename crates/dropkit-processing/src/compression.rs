use bytes::Bytes;
use dropkit_core::models::{ImageOutputFormat, ReduceQuality};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::imageops::FilterType as ResizeFilter;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

use crate::traits::{guard_panics, CodecError, CodecResult};

/// Quality presets for image compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityPreset {
    #[default]
    Normal, // Default quality, balanced size and quality
    Better,   // Higher quality, larger files
    Lighter,  // Smaller files
    Lightest, // Maximum compression
}

impl QualityPreset {
    /// Get quality value for JPEG (0-100)
    pub fn jpeg_quality(self) -> u8 {
        match self {
            QualityPreset::Normal => 75,
            QualityPreset::Better => 85,
            QualityPreset::Lighter => 65,
            QualityPreset::Lightest => 50,
        }
    }

    /// Get quality value for WebP (0-100)
    pub fn webp_quality(self) -> f32 {
        match self {
            QualityPreset::Normal => 80.0,
            QualityPreset::Better => 90.0,
            QualityPreset::Lighter => 70.0,
            QualityPreset::Lightest => 55.0,
        }
    }

    /// Next lower preset, used when stepping down towards a byte budget.
    pub fn lower(self) -> Option<Self> {
        match self {
            QualityPreset::Better => Some(QualityPreset::Normal),
            QualityPreset::Normal => Some(QualityPreset::Lighter),
            QualityPreset::Lighter => Some(QualityPreset::Lightest),
            QualityPreset::Lightest => None,
        }
    }
}

impl From<ReduceQuality> for QualityPreset {
    /// "less quality" means the strongest compression.
    fn from(quality: ReduceQuality) -> Self {
        match quality {
            ReduceQuality::Less => QualityPreset::Lightest,
            ReduceQuality::Medium => QualityPreset::Lighter,
            ReduceQuality::High => QualityPreset::Normal,
        }
    }
}

/// Output format for compressed images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl OutputFormat {
    /// Format to re-encode a decoded image in when the caller keeps the original.
    pub fn from_image_format(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Png => OutputFormat::Png,
            ImageFormat::Gif => OutputFormat::Gif,
            ImageFormat::WebP => OutputFormat::WebP,
            _ => OutputFormat::Jpeg,
        }
    }

    pub fn from_requested(requested: ImageOutputFormat, original: ImageFormat) -> Self {
        match requested {
            ImageOutputFormat::Original => Self::from_image_format(original),
            ImageOutputFormat::Jpg => OutputFormat::Jpeg,
            ImageOutputFormat::Png => OutputFormat::Png,
            ImageOutputFormat::Webp => OutputFormat::WebP,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Gif => "gif",
            OutputFormat::WebP => "webp",
        }
    }

    /// Whether the encoder has a quality knob.
    pub fn is_lossy(self) -> bool {
        matches!(self, OutputFormat::Jpeg | OutputFormat::WebP)
    }
}

/// Smallest edge the budget search will shrink an image to.
const MIN_EDGE: u32 = 16;

/// Largest edge libwebp accepts.
pub const WEBP_MAX_EDGE: u32 = 16383;

/// Scale applied per step when a lossless encoding is over budget.
const SHRINK_FACTOR: f32 = 0.8;

/// Main compression service
pub struct ImageCompressor;

impl ImageCompressor {
    /// Encode an image in `format` at the given quality.
    pub fn compress(
        img: &DynamicImage,
        format: OutputFormat,
        quality: QualityPreset,
    ) -> CodecResult<Bytes> {
        guard_panics("Image encoding", || match format {
            OutputFormat::Jpeg => Self::compress_jpeg(img, quality),
            OutputFormat::Png => Self::compress_png(img),
            OutputFormat::Gif => Self::compress_gif(img),
            OutputFormat::WebP => Self::compress_webp(img, quality),
        })
    }

    /// Encode an image so the result fits `max_bytes`.
    ///
    /// Lossy formats step the quality down first; once quality is exhausted,
    /// or for lossless formats, the image is shrunk until it fits. The last
    /// attempt is returned if even the smallest size does not fit.
    pub fn compress_within(
        img: &DynamicImage,
        format: OutputFormat,
        start: QualityPreset,
        max_bytes: u64,
    ) -> CodecResult<Bytes> {
        let mut current = img.clone();
        loop {
            let mut quality = start;
            loop {
                let encoded = Self::compress(&current, format, quality)?;
                if encoded.len() as u64 <= max_bytes {
                    return Ok(encoded);
                }
                match quality.lower().filter(|_| format.is_lossy()) {
                    Some(lower) => quality = lower,
                    None => break,
                }
            }

            let (width, height) = current.dimensions();
            if width.max(height) <= MIN_EDGE {
                tracing::debug!(width, height, max_bytes, "Image still over budget at minimum size");
                return Self::compress(&current, format, QualityPreset::Lightest);
            }
            let next_width = ((width as f32 * SHRINK_FACTOR) as u32).max(1);
            let next_height = ((height as f32 * SHRINK_FACTOR) as u32).max(1);
            current = current.resize_exact(next_width, next_height, ResizeFilter::Triangle);
        }
    }

    /// Shrink so neither edge exceeds `max_dimension`, keeping the aspect ratio.
    pub fn fit_within(img: DynamicImage, max_dimension: u32) -> DynamicImage {
        let (width, height) = img.dimensions();
        if width.max(height) <= max_dimension {
            return img;
        }
        img.resize(max_dimension, max_dimension, ResizeFilter::Lanczos3)
    }

    fn compress_jpeg(img: &DynamicImage, quality: QualityPreset) -> CodecResult<Bytes> {
        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.jpeg_quality());
        rgb.write_with_encoder(encoder)
            .map_err(|e| CodecError::codec(format!("JPEG encoding failed: {}", e)))?;
        Ok(Bytes::from(buffer))
    }

    fn compress_png(img: &DynamicImage) -> CodecResult<Bytes> {
        let mut buffer = Vec::new();
        let encoder =
            PngEncoder::new_with_quality(&mut buffer, CompressionType::Best, FilterType::Adaptive);
        img.write_with_encoder(encoder)
            .map_err(|e| CodecError::codec(format!("PNG encoding failed: {}", e)))?;
        Ok(Bytes::from(buffer))
    }

    fn compress_gif(img: &DynamicImage) -> CodecResult<Bytes> {
        let mut buffer = Vec::new();
        let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
        rgba.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Gif)
            .map_err(|e| CodecError::codec(format!("GIF encoding failed: {}", e)))?;
        Ok(Bytes::from(buffer))
    }

    fn compress_webp(img: &DynamicImage, quality: QualityPreset) -> CodecResult<Bytes> {
        let (width, height) = img.dimensions();
        if width.max(height) > WEBP_MAX_EDGE {
            return Err(CodecError::unsupported(format!(
                "WebP images are limited to {} px per edge, got {}x{}",
                WEBP_MAX_EDGE, width, height
            )));
        }

        // Convert to RGBA for WebP encoding
        let rgba_img = img.to_rgba8();

        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        let webp_data = encoder
            .encode_simple(false, quality.webp_quality())
            .map_err(|e| CodecError::unsupported(format!("WebP encoding failed: {:?}", e)))?;

        Ok(Bytes::copy_from_slice(&webp_data))
    }
}
