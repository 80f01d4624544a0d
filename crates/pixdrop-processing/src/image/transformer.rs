//! Transform dispatcher
//!
//! Maps a named operation onto the filters and re-encodes the result in the input's
//! format. Pure: no quota, storage or size awareness.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageFormat};
use pixdrop_core::AppError;

use crate::image::filters::ImageFilters;

/// Longest side produced by the `resize` operation.
pub const RESIZE_MAX_SIDE: u32 = 800;
/// Longest side of generated thumbnails.
pub const THUMBNAIL_MAX_SIDE: u32 = 200;

const BLUR_SIGMA: f32 = 3.0;
const SHARPEN_INTENSITY: f32 = 0.5;
const SATURATE_FACTOR: f32 = 2.0;
const TINT_COLOR: [u8; 3] = [0, 0, 255];

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),
}

impl From<TransformError> for AppError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::UnknownOperation(name) => AppError::UnknownOperation(name),
            other => AppError::ImageProcessing(other.to_string()),
        }
    }
}

/// The fixed set of named operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformOperation {
    /// Fit inside 800x800 without enlarging
    Resize,
    Grayscale,
    Blur,
    Sharpen,
    /// 90 degrees clockwise
    Rotate,
    Sepia,
    Negative,
    /// Blue tint
    Tint,
    /// Double saturation
    Saturate,
}

impl TransformOperation {
    pub const ALL: [TransformOperation; 9] = [
        TransformOperation::Resize,
        TransformOperation::Grayscale,
        TransformOperation::Blur,
        TransformOperation::Sharpen,
        TransformOperation::Rotate,
        TransformOperation::Sepia,
        TransformOperation::Negative,
        TransformOperation::Tint,
        TransformOperation::Saturate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TransformOperation::Resize => "resize",
            TransformOperation::Grayscale => "grayscale",
            TransformOperation::Blur => "blur",
            TransformOperation::Sharpen => "sharpen",
            TransformOperation::Rotate => "rotate",
            TransformOperation::Sepia => "sepia",
            TransformOperation::Negative => "negative",
            TransformOperation::Tint => "tint",
            TransformOperation::Saturate => "saturate",
        }
    }

    fn apply(self, img: DynamicImage) -> DynamicImage {
        match self {
            TransformOperation::Resize => ImageFilters::fit_within(img, RESIZE_MAX_SIDE),
            TransformOperation::Grayscale => ImageFilters::apply_grayscale(img),
            TransformOperation::Blur => ImageFilters::apply_blur(img, BLUR_SIGMA),
            TransformOperation::Sharpen => ImageFilters::apply_sharpen(img, SHARPEN_INTENSITY),
            TransformOperation::Rotate => img.rotate90(),
            TransformOperation::Sepia => ImageFilters::apply_sepia(img),
            TransformOperation::Negative => ImageFilters::apply_invert(img),
            TransformOperation::Tint => ImageFilters::apply_tint(img, TINT_COLOR),
            TransformOperation::Saturate => ImageFilters::scale_saturation(img, SATURATE_FACTOR),
        }
    }
}

impl FromStr for TransformOperation {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == normalized)
            .ok_or_else(|| TransformError::UnknownOperation(s.to_string()))
    }
}

impl fmt::Display for TransformOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded output of a transform.
#[derive(Debug, Clone)]
pub struct TransformedImage {
    pub data: Bytes,
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Dispatches named operations over encoded image blobs
pub struct TransformDispatcher;

impl TransformDispatcher {
    /// Apply `operation_name` to `data`. Unknown names are rejected before decoding.
    pub fn transform(
        data: &[u8],
        operation_name: &str,
    ) -> Result<TransformedImage, TransformError> {
        let operation: TransformOperation = operation_name.parse()?;
        Self::apply(data, operation)
    }

    pub fn apply(
        data: &[u8],
        operation: TransformOperation,
    ) -> Result<TransformedImage, TransformError> {
        let (img, format) = Self::decode(data)?;
        tracing::debug!(
            operation = %operation,
            format = ?format,
            input_bytes = data.len(),
            "Applying image transform"
        );
        Self::encode(operation.apply(img), format)
    }

    /// Downscaled preview in the input's format.
    pub fn thumbnail(data: &[u8]) -> Result<TransformedImage, TransformError> {
        let (img, format) = Self::decode(data)?;
        Self::encode(ImageFilters::fit_within(img, THUMBNAIL_MAX_SIDE), format)
    }

    fn decode(data: &[u8]) -> Result<(DynamicImage, ImageFormat), TransformError> {
        let reader = image::ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| TransformError::Decode(e.to_string()))?;
        let format = reader
            .format()
            .ok_or_else(|| TransformError::Decode("unrecognized image format".to_string()))?;
        let img = reader
            .decode()
            .map_err(|e| TransformError::Decode(e.to_string()))?;
        Ok((img, format))
    }

    fn encode(img: DynamicImage, format: ImageFormat) -> Result<TransformedImage, TransformError> {
        let (format, content_type) = match format {
            ImageFormat::Png => (ImageFormat::Png, "image/png"),
            ImageFormat::Gif => (ImageFormat::Gif, "image/gif"),
            ImageFormat::WebP => (ImageFormat::WebP, "image/webp"),
            _ => (ImageFormat::Jpeg, "image/jpeg"),
        };

        // JPEG has no alpha channel; GIF and WebP encoders take RGBA.
        let img = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
            ImageFormat::Gif | ImageFormat::WebP => DynamicImage::ImageRgba8(img.to_rgba8()),
            _ => img,
        };

        let (width, height) = img.dimensions();
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format)
            .map_err(|e| TransformError::Encode(e.to_string()))?;

        Ok(TransformedImage {
            data: Bytes::from(buffer),
            content_type,
            width,
            height,
        })
    }
}
