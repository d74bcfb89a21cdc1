// Upload handling: validates and decodes one user-selected image

use crate::error::{EmotionDetectorError, Result};
use crate::models::Frame;
use image::{DynamicImage, ImageFormat};
use std::path::Path;
use tracing::{debug, warn};

/// Image formats accepted from uploads
const ACCEPTED_FORMATS: [ImageFormat; 5] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Bmp,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// A decoded upload, ready for the pipeline
#[derive(Clone, Debug)]
pub struct UploadedImage {
    pub frame: Frame,
    pub format: ImageFormat,
}

impl UploadedImage {
    /// Creates an upload from a decoded image
    pub fn from_dynamic_image(img: DynamicImage, format: ImageFormat) -> Self {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self {
            frame: Frame::new(rgb.into_raw(), width, height),
            format,
        }
    }

    /// Validates and decodes raw upload bytes.
    ///
    /// `mime_type` is the type reported by the uploader, if any; anything not
    /// `image/*` is rejected before the bytes are inspected.
    pub fn from_bytes(bytes: &[u8], mime_type: Option<&str>) -> Result<Self> {
        if let Some(mime) = mime_type {
            if !mime.trim().to_ascii_lowercase().starts_with("image/") {
                warn!("Rejected upload with type {}", mime);
                return Err(EmotionDetectorError::InvalidUpload(format!(
                    "Please select an image file (got {mime})"
                )));
            }
        }

        let format = image::guess_format(bytes).map_err(|_| {
            EmotionDetectorError::InvalidUpload("Please select an image file".to_string())
        })?;
        if !ACCEPTED_FORMATS.contains(&format) {
            return Err(EmotionDetectorError::InvalidUpload(format!(
                "Unsupported image format: {format:?}"
            )));
        }

        let img = image::load_from_memory_with_format(bytes, format).map_err(|e| {
            EmotionDetectorError::InvalidUpload(format!("Failed to decode image: {e}"))
        })?;
        if img.width() == 0 || img.height() == 0 {
            return Err(EmotionDetectorError::InvalidUpload(
                "Image has no pixels".to_string(),
            ));
        }

        debug!(?format, width = img.width(), height = img.height(), "upload decoded");
        Ok(Self::from_dynamic_image(img, format))
    }

    /// Loads an upload from a file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let mime = ImageFormat::from_path(path)
            .ok()
            .map(|format| format.to_mime_type());

        Self::from_bytes(&bytes, mime)
    }
}
