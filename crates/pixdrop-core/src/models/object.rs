use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{PROCESSED_PREFIX, THUMBNAILS_PREFIX, UPLOADS_PREFIX};

/// Namespace an object lives in. The role is encoded as the key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectRole {
    Upload,
    Processed,
    Thumbnail,
}

impl ObjectRole {
    pub const ALL: [ObjectRole; 3] = [
        ObjectRole::Upload,
        ObjectRole::Processed,
        ObjectRole::Thumbnail,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            ObjectRole::Upload => UPLOADS_PREFIX,
            ObjectRole::Processed => PROCESSED_PREFIX,
            ObjectRole::Thumbnail => THUMBNAILS_PREFIX,
        }
    }

    /// Full storage key for `name` inside this namespace.
    pub fn key(self, name: &str) -> String {
        format!("{}{}", self.prefix(), name)
    }

    /// Role of a key, if it lives in one of the known namespaces.
    pub fn of_key(key: &str) -> Option<ObjectRole> {
        Self::ALL.into_iter().find(|role| key.starts_with(role.prefix()))
    }
}

impl fmt::Display for ObjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_end_matches('/'))
    }
}

/// Listing metadata for a blob held by the object store.
///
/// Never cached beyond a single request or sweep pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub last_modified: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e_tag: Option<String>,
}

impl StoredObject {
    pub fn role(&self) -> Option<ObjectRole> {
        ObjectRole::of_key(&self.key)
    }

    /// Final path component of the key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_key() {
        let key = ObjectRole::Processed.key("abc-cat.png");
        assert_eq!(key, "processed/abc-cat.png");
        assert_eq!(ObjectRole::of_key(&key), Some(ObjectRole::Processed));
        assert_eq!(ObjectRole::of_key("stats/monthly-usage.json"), None);
    }

    #[test]
    fn file_name_is_last_component() {
        let object = StoredObject {
            key: "uploads/1234-dog.jpg".to_string(),
            size: 10,
            content_type: None,
            last_modified: Utc::now(),
            e_tag: None,
        };
        assert_eq!(object.file_name(), "1234-dog.jpg");
        assert_eq!(object.role(), Some(ObjectRole::Upload));
    }
}
