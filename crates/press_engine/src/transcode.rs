use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use press_core::MediaType;
use thiserror::Error;

/// How raster images are prepared for the e-reader screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageNormalization {
    pub max_width: u32,
    pub max_height: u32,
    pub jpeg_quality: u8,
    pub grayscale: bool,
}

impl Default for ImageNormalization {
    fn default() -> Self {
        Self {
            max_width: 450,
            max_height: 550,
            jpeg_quality: 60,
            grayscale: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("unsupported image type {0}")]
    Unsupported(MediaType),
    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),
}

/// Re-encodes `bytes` in the format named by `media_type`.
///
/// Rasters are downscaled to fit the bounds (never upscaled) and optionally
/// turned to grayscale. SVG passes through unchanged.
pub fn normalize(
    bytes: &[u8],
    media_type: MediaType,
    settings: &ImageNormalization,
) -> Result<Vec<u8>, TranscodeError> {
    let format = match media_type {
        MediaType::Svg => return Ok(bytes.to_vec()),
        MediaType::Unknown => return Err(TranscodeError::Unsupported(media_type)),
        MediaType::Jpeg => ImageFormat::Jpeg,
        MediaType::Png => ImageFormat::Png,
        MediaType::Gif => ImageFormat::Gif,
    };

    let mut img = image::load_from_memory(bytes)?;
    if img.width() > settings.max_width || img.height() > settings.max_height {
        img = img.resize(settings.max_width, settings.max_height, FilterType::Triangle);
    }
    if settings.grayscale {
        img = img.grayscale();
    }

    let mut out = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel.
            let flat = if settings.grayscale {
                DynamicImage::ImageLuma8(img.to_luma8())
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8())
            };
            let encoder = JpegEncoder::new_with_quality(&mut out, settings.jpeg_quality);
            flat.write_with_encoder(encoder)?;
        }
        ImageFormat::Gif => {
            DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut Cursor::new(&mut out), format)?;
        }
        _ => img.write_to(&mut Cursor::new(&mut out), format)?,
    }
    Ok(out)
}
