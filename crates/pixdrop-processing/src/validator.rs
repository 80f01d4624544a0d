use base64::{engine::general_purpose::STANDARD, Engine as _};
use pixdrop_core::{AppError, IngestionPolicy};

/// Common validation errors for uploaded images
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Invalid content type: {content_type} (allowed: {allowed:?})")]
    InvalidContentType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Invalid image payload: {0}")]
    InvalidPayload(String),

    #[error("Empty file")]
    EmptyFile,
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::FileTooLarge { size, max } => AppError::PayloadTooLarge { size, max },
            ValidationError::InvalidContentType {
                content_type,
                allowed,
            } => AppError::UnsupportedType {
                content_type,
                allowed,
            },
            other => AppError::InvalidInput(other.to_string()),
        }
    }
}

/// Upload validator
///
/// Size and type rules only; it has no store or quota awareness.
pub struct MediaValidator {
    max_file_size: u64,
    allowed_content_types: Vec<String>,
}

impl MediaValidator {
    pub fn new(max_file_size: u64, allowed_content_types: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_content_types: allowed_content_types
                .into_iter()
                .map(|ct| ct.trim().to_lowercase())
                .collect(),
        }
    }

    pub fn from_policy(policy: &IngestionPolicy) -> Self {
        Self::new(
            policy.max_file_size_bytes,
            policy.allowed_content_types.clone(),
        )
    }

    /// Validate file size. A size equal to the maximum is accepted.
    pub fn validate_file_size(&self, size: u64) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Validate content type
    pub fn validate_content_type(&self, content_type: &str) -> Result<(), ValidationError> {
        let normalized = content_type.trim().to_lowercase();

        if !self
            .allowed_content_types
            .iter()
            .any(|ct| ct == &normalized)
        {
            return Err(ValidationError::InvalidContentType {
                content_type: content_type.to_string(),
                allowed: self.allowed_content_types.clone(),
            });
        }

        Ok(())
    }
}

/// Reduce a client-supplied file name to a safe final path component.
pub fn sanitize_file_name(file_name: &str) -> Result<String, ValidationError> {
    let last = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if last.is_empty() || last == "." || last.contains("..") {
        return Err(ValidationError::InvalidFilename(file_name.to_string()));
    }

    if last.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidFilename(file_name.to_string()));
    }

    Ok(last.to_string())
}

/// Decode a base64 image body, optionally wrapped in a `data:image/*;base64,` URL.
pub fn decode_image_payload(payload: &str) -> Result<Vec<u8>, ValidationError> {
    let trimmed = payload.trim();
    let encoded = match trimmed.strip_prefix("data:") {
        Some(rest) => match rest.split_once(";base64,") {
            Some((_, data)) => data,
            None => {
                return Err(ValidationError::InvalidPayload(
                    "data URL is not base64 encoded".to_string(),
                ))
            }
        },
        None => trimmed,
    };

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| ValidationError::InvalidPayload(e.to_string()))?;

    if bytes.is_empty() {
        return Err(ValidationError::EmptyFile);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> MediaValidator {
        MediaValidator::from_policy(&IngestionPolicy::default())
    }

    #[test]
    fn test_size_boundary_is_inclusive() {
        let v = validator();
        let max = 20 * 1024 * 1024;
        assert!(v.validate_file_size(max).is_ok());
        assert!(matches!(
            v.validate_file_size(max + 1),
            Err(ValidationError::FileTooLarge { .. })
        ));
        assert!(matches!(v.validate_file_size(0), Err(ValidationError::EmptyFile)));
    }

    #[test]
    fn test_content_type() {
        let v = validator();
        assert!(v.validate_content_type("image/png").is_ok());
        assert!(v.validate_content_type("IMAGE/JPEG").is_ok());
        assert!(v.validate_content_type("image/svg+xml").is_err());
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("cat.png").unwrap(), "cat.png");
        assert_eq!(sanitize_file_name("a/b/cat.png").unwrap(), "cat.png");
        assert_eq!(sanitize_file_name("C:\\pics\\cat.png").unwrap(), "cat.png");
        assert!(sanitize_file_name("").is_err());
        assert!(sanitize_file_name("dir/").is_err());
        assert!(sanitize_file_name("..").is_err());
        assert!(sanitize_file_name("evil..png").is_err());
    }

    #[test]
    fn test_decode_payload_with_and_without_data_url() {
        let raw = STANDARD.encode(b"\xff\xd8\xffhello");
        assert_eq!(decode_image_payload(&raw).unwrap(), b"\xff\xd8\xffhello");
        let data_url = format!("data:image/jpeg;base64,{}", raw);
        assert_eq!(decode_image_payload(&data_url).unwrap(), b"\xff\xd8\xffhello");
        assert!(decode_image_payload("!!!").is_err());
        assert!(matches!(decode_image_payload(""), Err(ValidationError::EmptyFile)));
    }

    #[test]
    fn test_app_error_mapping() {
        let err: AppError = ValidationError::FileTooLarge { size: 2, max: 1 }.into();
        assert!(matches!(err, AppError::PayloadTooLarge { size: 2, max: 1 }));
        let err: AppError = ValidationError::EmptyFile.into();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
