//! Shared key generation for storage backends.
//!
//! Key format: `{role prefix}{name}`, where uploads are named `{uuid}-{file name}` so two
//! clients uploading `cat.png` never collide. Derived artifacts reuse the name they were
//! requested under.

use pixdrop_core::ObjectRole;
use uuid::Uuid;

/// Generate the key for a freshly admitted upload. Returns `(key, stored_name)`.
pub fn generate_upload_key(file_name: &str) -> (String, String) {
    let stored_name = format!("{}-{}", Uuid::new_v4(), file_name);
    (ObjectRole::Upload.key(&stored_name), stored_name)
}

pub fn processed_key(file_name: &str) -> String {
    ObjectRole::Processed.key(file_name)
}

pub fn thumbnail_key(file_name: &str) -> String {
    ObjectRole::Thumbnail.key(file_name)
}

/// Every key a client-visible image may occupy.
pub fn all_image_keys(file_name: &str) -> Vec<String> {
    ObjectRole::ALL
        .into_iter()
        .map(|role| role.key(file_name))
        .collect()
}

/// Identifier shown in listings: the part of the name before the first `-`.
pub fn image_id(file_name: &str) -> &str {
    file_name.split('-').next().unwrap_or(file_name)
}
