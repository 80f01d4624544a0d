//! Image processing module
//!
//! - Pixel filters (filters)
//! - Named-operation dispatch and re-encoding (transformer)

pub mod filters;
pub mod transformer;

pub use filters::ImageFilters;
pub use transformer::{TransformDispatcher, TransformError, TransformOperation, TransformedImage};
