//! Pixdrop Processing Library
//!
//! Upload validation and the image transform dispatcher. Nothing in this crate touches the
//! object store or the quota ledger; callers decide what to do with the results.

pub mod validator;

#[cfg(feature = "image")]
pub mod image;

pub use validator::{decode_image_payload, sanitize_file_name, MediaValidator, ValidationError};

#[cfg(feature = "image")]
pub use image::{
    ImageFilters, TransformDispatcher, TransformError, TransformOperation, TransformedImage,
};
