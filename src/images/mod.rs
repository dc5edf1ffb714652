//! Image download and normalization pipeline
//!
//! Newly discovered images are fetched, validated (byte-size bounds and
//! magic signature), decoded, resized down to the configured maximum
//! dimension when needed, and re-encoded as JPEG into the blob cache.
//!
//! Any failure along the way marks the image unsupported for the rest of
//! the run; a transient network blip therefore rejects an image
//! permanently. That matches the long-standing crawl policy: forward
//! progress over retry bookkeeping.

use crate::config::Config;
use crate::storage::ImageMetadata;
use image::imageops::FilterType;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

/// Why an image was rejected by the pipeline
#[derive(Debug, Error)]
pub enum ImageFailure {
    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("download returned status {0}")]
    Status(u16),

    #[error("file too small: {0} bytes")]
    TooSmall(usize),

    #[error("file too large: {0} bytes")]
    TooLarge(usize),

    #[error("unrecognized image signature")]
    UnknownSignature,

    #[error("decode/encode failed: {0}")]
    Codec(#[from] image::ImageError),

    #[error("cache write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A normalized image ready for the cache
#[derive(Debug)]
pub struct NormalizedImage {
    /// Dimensions of the source image, before any resize
    pub width: u32,
    pub height: u32,

    /// Source format detected from the magic signature ("jpg" or "png")
    pub mime: String,

    /// Re-encoded JPEG bytes
    pub jpeg: Vec<u8>,
}

/// Detects the source format from the file's magic signature
pub fn sniff_format(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xD8 {
        return Some("jpg");
    }
    if bytes.len() >= 8 && bytes[..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] {
        return Some("png");
    }
    None
}

/// Validates, decodes, optionally resizes, and re-encodes an image
///
/// The reported dimensions are those of the source image; when either axis
/// exceeds `max_image_dims` the encoded output is scaled down to fit, at
/// the configured JPEG quality.
pub fn normalize_image(bytes: &[u8], config: &Config) -> Result<NormalizedImage, ImageFailure> {
    if bytes.len() < config.min_image_file_size {
        return Err(ImageFailure::TooSmall(bytes.len()));
    }
    if bytes.len() > config.max_image_file_size {
        return Err(ImageFailure::TooLarge(bytes.len()));
    }
    let mime = sniff_format(bytes).ok_or(ImageFailure::UnknownSignature)?;

    let decoded = image::load_from_memory(bytes)?;
    let width = decoded.width();
    let height = decoded.height();

    let max = config.max_image_dims;
    let output = if width > max || height > max {
        let factor = (max as f64 / width as f64).min(max as f64 / height as f64);
        let new_width = ((width as f64) * factor) as u32;
        let new_height = ((height as f64) * factor) as u32;
        decoded.resize_exact(new_width.max(1), new_height.max(1), FilterType::Triangle)
    } else {
        decoded
    };

    let mut jpeg = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
        Cursor::new(&mut jpeg),
        config.jpeg_quality,
    );
    output.to_rgb8().write_with_encoder(encoder)?;

    Ok(NormalizedImage {
        width,
        height,
        mime: mime.to_string(),
        jpeg,
    })
}

/// Downloads an image, normalizes it, and writes the blob to `dest`
///
/// Returns the metadata to patch onto the image record. The recorded file
/// size is that of the downloaded payload, not the re-encoded blob.
pub async fn download_image(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    config: &Config,
) -> Result<ImageMetadata, ImageFailure> {
    let response = client.get(url).send().await?;
    let status = response.status().as_u16();
    if status != 200 {
        return Err(ImageFailure::Status(status));
    }
    let bytes = response.bytes().await?;

    let normalized = normalize_image(&bytes, config)?;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(dest, &normalized.jpeg)?;

    Ok(ImageMetadata {
        alt: String::new(),
        surrounding: String::new(),
        file_size: bytes.len() as u64,
        width: normalized.width,
        height: normalized.height,
        mime: normalized.mime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    /// Encodes a gradient test image of the given size
    fn sample(format: image::ImageFormat, width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 251) as u8, (y % 241) as u8, ((x ^ y) % 239) as u8])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), format)
            .unwrap();
        bytes
    }

    #[test]
    fn sniffs_jpeg_and_png() {
        let jpeg = sample(image::ImageFormat::Jpeg, 64, 64);
        let png = sample(image::ImageFormat::Png, 64, 64);
        assert_eq!(sniff_format(&jpeg), Some("jpg"));
        assert_eq!(sniff_format(&png), Some("png"));
        assert_eq!(sniff_format(&[0u8; 16]), None);
    }

    #[test]
    fn normalizes_valid_jpeg() {
        let config = Config::default();
        let bytes = sample(image::ImageFormat::Jpeg, 200, 150);
        let normalized = normalize_image(&bytes, &config).unwrap();
        assert_eq!(normalized.width, 200);
        assert_eq!(normalized.height, 150);
        assert_eq!(normalized.mime, "jpg");
        assert!(normalized.jpeg.len() < config.max_image_file_size);
        assert_eq!(sniff_format(&normalized.jpeg), Some("jpg"));
    }

    #[test]
    fn png_source_reencodes_to_jpeg() {
        let config = Config::default();
        let bytes = sample(image::ImageFormat::Png, 64, 64);
        let normalized = normalize_image(&bytes, &config).unwrap();
        assert_eq!(normalized.mime, "png");
        assert_eq!(sniff_format(&normalized.jpeg), Some("jpg"));
    }

    #[test]
    fn tiny_blob_is_rejected() {
        let config = Config::default();
        let result = normalize_image(&[0xFFu8; 50], &config);
        assert!(matches!(result, Err(ImageFailure::TooSmall(50))));
    }

    #[test]
    fn unknown_signature_is_rejected() {
        let config = Config::default();
        let result = normalize_image(&[0x42u8; 500], &config);
        assert!(matches!(result, Err(ImageFailure::UnknownSignature)));
    }

    #[test]
    fn oversize_image_is_scaled_down() {
        let config = Config::default();
        let bytes = sample(image::ImageFormat::Jpeg, 2000, 100);
        let normalized = normalize_image(&bytes, &config).unwrap();
        // Recorded dimensions stay those of the source
        assert_eq!((normalized.width, normalized.height), (2000, 100));

        // The cached blob itself fits within the dimension cap
        let reencoded = image::load_from_memory(&normalized.jpeg).unwrap();
        assert_eq!((reencoded.width(), reencoded.height()), (1280, 64));
    }
}
