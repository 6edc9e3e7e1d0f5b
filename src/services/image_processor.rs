// src/services/image_processor.rs
use crate::errors::ThumbsmithError;
use crate::models::InlineImage;
use crate::services::gemini::InlineData;
use image::{GenericImageView, ImageFormat as ImgFormat};

const MAX_DIMENSION: u32 = 4096;
const UPLOAD_EDGE: u32 = 2048;

pub struct ImageProcessor {
    max_upload_bytes: usize,
}

impl ImageProcessor {
    pub fn new(max_upload_bytes: usize) -> Self {
        Self { max_upload_bytes }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Checks an uploaded image and shrinks it to a size the model accepts.
    pub fn prepare_upload(&self, data: &[u8]) -> Result<InlineImage, ThumbsmithError> {
        if data.is_empty() {
            return Err(ThumbsmithError::Validation("No image uploaded".to_string()));
        }
        if data.len() > self.max_upload_bytes {
            return Err(ThumbsmithError::Validation(format!(
                "Image is {} bytes, the limit is {}",
                data.len(),
                self.max_upload_bytes
            )));
        }

        let format = image::guess_format(data).map_err(|e| {
            ThumbsmithError::ImageProcessing(format!("Unrecognized image format: {}", e))
        })?;
        let mime_type = mime_for(format)?;

        self.validate_image(data)?;
        let resized = self.resize_if_needed(data, UPLOAD_EDGE)?;

        Ok(match resized {
            Some(png) => InlineImage {
                data: png,
                mime_type: "image/png".to_string(),
            },
            None => InlineImage {
                data: data.to_vec(),
                mime_type: mime_type.to_string(),
            },
        })
    }

    pub fn validate_image(&self, data: &[u8]) -> Result<(u32, u32), ThumbsmithError> {
        let img = image::load_from_memory(data).map_err(|e| {
            ThumbsmithError::ImageProcessing(format!("Invalid image format: {}", e))
        })?;

        let (width, height) = img.dimensions();

        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(ThumbsmithError::ImageProcessing(format!(
                "Image dimensions exceed {}x{}",
                MAX_DIMENSION, MAX_DIMENSION
            )));
        }

        Ok((width, height))
    }

    /// Returns a PNG re-encoding when the image is larger than `max_size`.
    pub fn resize_if_needed(
        &self,
        data: &[u8],
        max_size: u32,
    ) -> Result<Option<Vec<u8>>, ThumbsmithError> {
        let img = image::load_from_memory(data)
            .map_err(|e| ThumbsmithError::ImageProcessing(format!("Failed to load image: {}", e)))?;

        let (width, height) = img.dimensions();

        if width <= max_size && height <= max_size {
            return Ok(None);
        }

        let ratio = (max_size as f32 / width.max(height) as f32).min(1.0);
        let new_width = ((width as f32 * ratio) as u32).max(1);
        let new_height = ((height as f32 * ratio) as u32).max(1);

        let resized = img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3);

        let mut output = Vec::new();
        resized
            .write_to(&mut std::io::Cursor::new(&mut output), ImgFormat::Png)
            .map_err(|e| {
                ThumbsmithError::ImageProcessing(format!("Failed to encode resized image: {}", e))
            })?;

        Ok(Some(output))
    }
}

fn mime_for(format: ImgFormat) -> Result<&'static str, ThumbsmithError> {
    match format {
        ImgFormat::Png => Ok("image/png"),
        ImgFormat::Jpeg => Ok("image/jpeg"),
        ImgFormat::WebP => Ok("image/webp"),
        ImgFormat::Gif => Ok("image/gif"),
        other => Err(ThumbsmithError::ImageProcessing(format!(
            "Unsupported image format: {:?}",
            other
        ))),
    }
}

/// Model output is always presented as PNG, whatever label came back with it.
pub fn png_data_uri(image: &InlineData) -> String {
    format!("data:image/png;base64,{}", image.data)
}

pub fn to_data_uri(image: &InlineData) -> String {
    let mime_type = if image.mime_type.is_empty() {
        "image/png"
    } else {
        image.mime_type.as_str()
    };
    format!("data:{};base64,{}", mime_type, image.data)
}

/// Splits `data:<mime>;base64,<payload>`. A bare base64 string is taken as PNG.
pub fn parse_data_uri(uri: &str) -> Result<InlineData, ThumbsmithError> {
    let uri = uri.trim();
    let Some(rest) = uri.strip_prefix("data:") else {
        if uri.is_empty() {
            return Err(ThumbsmithError::Validation("Image data is empty".to_string()));
        }
        return Ok(InlineData {
            data: uri.to_string(),
            mime_type: "image/png".to_string(),
        });
    };

    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| ThumbsmithError::Validation("Malformed data URI".to_string()))?;
    let mime_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| ThumbsmithError::Validation("Data URI is not base64".to_string()))?;
    if !mime_type.starts_with("image/") || data.is_empty() {
        return Err(ThumbsmithError::Validation(
            "Data URI does not hold an image".to_string(),
        ));
    }

    Ok(InlineData {
        data: data.to_string(),
        mime_type: mime_type.to_string(),
    })
}
