//! Image transformer - recompression, format conversion, resizing and size reduction

use bytes::Bytes;
use dropkit_core::models::{ReduceMode, ReduceOptions, ResizeMode, ResizeOptions};
use dropkit_core::PipelineConfig;
use image::imageops::FilterType;
use image::GenericImageView;
use std::sync::Arc;

use crate::compression::{ImageCompressor, OutputFormat, QualityPreset};
use crate::traits::{CodecError, CodecResult, ImageCodec};
use dropkit_core::ConversionCause;

/// Largest output a resize step may allocate, in pixels.
pub const MAX_RESIZE_PIXELS: u64 = 64_000_000;

/// Bounds applied whenever an image is recompressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSettings {
    pub max_dimension: u32,
    pub max_bytes: u64,
}

impl ImageSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_dimension: config.image_max_dimension,
            max_bytes: config.image_max_size_bytes,
        }
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Image operations used by the dispatcher and the per-file stages.
#[derive(Clone)]
pub struct ImageTransformer {
    codec: Arc<dyn ImageCodec>,
    settings: ImageSettings,
}

impl std::fmt::Debug for ImageTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageTransformer")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ImageTransformer {
    pub fn new(codec: Arc<dyn ImageCodec>, settings: ImageSettings) -> Self {
        Self { codec, settings }
    }

    pub fn settings(&self) -> ImageSettings {
        self.settings
    }

    /// Shrink to the configured bound and re-encode in the original container,
    /// within the configured byte budget.
    pub fn recompress(&self, data: &[u8]) -> CodecResult<(Bytes, OutputFormat)> {
        let (img, source_format) = self.codec.decode(data)?;
        let format = OutputFormat::from_image_format(source_format);
        let img = ImageCompressor::fit_within(img, self.settings.max_dimension);
        let bytes = ImageCompressor::compress_within(
            &img,
            format,
            QualityPreset::Normal,
            self.settings.max_bytes,
        )?;
        tracing::debug!(
            input_bytes = data.len(),
            output_bytes = bytes.len(),
            format = ?format,
            "Image recompressed"
        );
        Ok((bytes, format))
    }

    /// Recompress, then store the pixels in a WebP container.
    pub fn to_webp(&self, data: &[u8]) -> CodecResult<Bytes> {
        let (img, _) = self.codec.decode(data)?;
        let img = ImageCompressor::fit_within(img, self.settings.max_dimension);
        ImageCompressor::compress_within(
            &img,
            OutputFormat::WebP,
            QualityPreset::Normal,
            self.settings.max_bytes,
        )
    }

    /// Apply a resize step. Returns the new bytes and the container they are in.
    pub fn resize(&self, data: &[u8], options: &ResizeOptions) -> CodecResult<(Bytes, OutputFormat)> {
        let (img, source_format) = self.codec.decode(data)?;
        let (width, height) = img.dimensions();
        let (target_width, target_height) = target_dimensions(width, height, options);
        let pixels = u64::from(target_width) * u64::from(target_height);
        if pixels > MAX_RESIZE_PIXELS {
            return Err(CodecError::new(
                ConversionCause::ResourceExhausted,
                format!(
                    "Resizing to {}x{} exceeds the {} pixel limit",
                    target_width, target_height, MAX_RESIZE_PIXELS
                ),
            ));
        }
        let format = OutputFormat::from_requested(options.output_format, source_format);

        let resized = if (target_width, target_height) == (width, height) {
            img
        } else {
            img.resize_exact(target_width, target_height, FilterType::Lanczos3)
        };

        tracing::debug!(
            from_width = width,
            from_height = height,
            to_width = target_width,
            to_height = target_height,
            format = ?format,
            "Image resized"
        );

        let bytes = ImageCompressor::compress(&resized, format, QualityPreset::Better)?;
        Ok((bytes, format))
    }

    /// Apply a reduce-size step, keeping the container.
    ///
    /// Never returns something larger than the input.
    pub fn reduce(&self, data: &[u8], options: &ReduceOptions) -> CodecResult<Bytes> {
        let (img, source_format) = self.codec.decode(data)?;
        let format = OutputFormat::from_image_format(source_format);

        let reduced = match options.mode {
            ReduceMode::Max => ImageCompressor::compress(&img, format, options.quality.into())?,
            ReduceMode::Email => ImageCompressor::compress_within(
                &img,
                format,
                QualityPreset::Normal,
                options.email_limit.bytes(),
            )?,
        };

        if reduced.len() >= data.len() {
            return Ok(Bytes::copy_from_slice(data));
        }
        Ok(reduced)
    }
}

/// Output size of a resize step for a `width` x `height` source.
pub fn target_dimensions(width: u32, height: u32, options: &ResizeOptions) -> (u32, u32) {
    let scale = |value: u32, numerator: u64, denominator: u64| -> u32 {
        if denominator == 0 {
            return value.max(1);
        }
        ((u64::from(value) * numerator + denominator / 2) / denominator).max(1) as u32
    };

    match options.mode {
        ResizeMode::Percentage => {
            let pct = u64::from(options.percentage);
            (scale(width, pct, 100), scale(height, pct, 100))
        }
        ResizeMode::Dimensions => {
            if !options.maintain_aspect_ratio {
                return (options.width, options.height);
            }
            // Fit inside the box: use whichever edge is the tighter constraint.
            let by_width = u64::from(options.width) * u64::from(height);
            let by_height = u64::from(options.height) * u64::from(width);
            if by_width <= by_height {
                (
                    options.width,
                    scale(height, u64::from(options.width), u64::from(width)),
                )
            } else {
                (
                    scale(width, u64::from(options.height), u64::from(height)),
                    options.height,
                )
            }
        }
        ResizeMode::MaxWidth => {
            if width <= options.width {
                (width, height)
            } else if options.maintain_aspect_ratio {
                (
                    options.width,
                    scale(height, u64::from(options.width), u64::from(width)),
                )
            } else {
                (options.width, height)
            }
        }
        ResizeMode::MaxHeight => {
            if height <= options.height {
                (width, height)
            } else if options.maintain_aspect_ratio {
                (
                    scale(width, u64::from(options.height), u64::from(height)),
                    options.height,
                )
            } else {
                (width, options.height)
            }
        }
    }
}
