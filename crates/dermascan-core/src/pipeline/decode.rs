//! Upload decoding with format sniffing, dimension limits, and timeout support.

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use std::io::Cursor;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::ProcessingError;

/// Image decoder with configurable limits and timeout.
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    limits: LimitsConfig,
}

/// Result of decoding an upload.
pub struct DecodedImage {
    /// The decoded image, converted to RGB
    pub image: DynamicImage,
    /// Format detected from the content
    pub format: ImageFormat,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Size of the upload in bytes
    pub byte_len: usize,
}

impl ImageDecoder {
    /// Create a new decoder with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Decode upload bytes on the blocking pool, bounded by the decode timeout.
    pub async fn decode(&self, bytes: Vec<u8>) -> Result<DecodedImage, ProcessingError> {
        let timeout_duration = Duration::from_millis(self.limits.decode_timeout_ms);
        let max_dim = self.limits.max_image_dimension;

        let decode_result = timeout(timeout_duration, async {
            tokio::task::spawn_blocking(move || Self::decode_sync(&bytes, max_dim)).await
        })
        .await;

        match decode_result {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ProcessingError::Task {
                stage: "decode".to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(ProcessingError::Timeout {
                stage: "decode".to_string(),
                timeout_ms: self.limits.decode_timeout_ms,
            }),
        }
    }

    /// Synchronous decode (runs in spawn_blocking).
    ///
    /// Dimensions are read from the header first so oversized images are
    /// rejected before their pixel data is allocated.
    pub fn decode_sync(bytes: &[u8], max_dim: u32) -> Result<DecodedImage, ProcessingError> {
        let format = Self::sniff(bytes)?;

        let (width, height) = ImageReader::with_format(Cursor::new(bytes), format)
            .into_dimensions()
            .map_err(|e| ProcessingError::Decode {
                message: e.to_string(),
            })?;
        if width > max_dim || height > max_dim {
            return Err(ProcessingError::ImageTooLarge {
                width,
                height,
                max_dim,
            });
        }

        let image = ImageReader::with_format(Cursor::new(bytes), format)
            .decode()
            .map_err(|e| ProcessingError::Decode {
                message: e.to_string(),
            })?;

        // Palette, grayscale, alpha and 16-bit inputs all become 8-bit RGB.
        let image = match image {
            DynamicImage::ImageRgb8(_) => image,
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        };

        let (width, height) = image.dimensions();
        Ok(DecodedImage {
            image,
            format,
            width,
            height,
            byte_len: bytes.len(),
        })
    }

    /// Detect the image format from magic bytes.
    fn sniff(bytes: &[u8]) -> Result<ImageFormat, ProcessingError> {
        if bytes.is_empty() {
            return Err(ProcessingError::Decode {
                message: "Empty upload".to_string(),
            });
        }
        image::guess_format(bytes).map_err(|e| ProcessingError::Decode {
            message: format!("Cannot detect image format: {}", e),
        })
    }
}

/// Convert an ImageFormat to a string representation.
pub fn format_to_string(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Ico => "ico",
        ImageFormat::Pnm => "pnm",
        ImageFormat::Avif => "avif",
        _ => "unknown",
    }
}
