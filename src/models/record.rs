use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::models::identity::ImageId;

/// References to the artifacts produced for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "camelCase")]
pub struct ImageRefs {
    pub original: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blur_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub pk: ImageId,
    pub images: ImageRefs,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

impl ImageRecord {
    pub fn new(pk: ImageId, original: impl Into<String>) -> Self {
        Self {
            pk,
            images: ImageRefs {
                original: original.into(),
                normalized: None,
                blur_hash: None,
            },
            created_at: chrono::Utc::now().timestamp_millis(),
            updated_at: None,
        }
    }

    /// True while only the original reference is set.
    pub fn is_pristine(&self) -> bool {
        self.images.normalized.is_none() && self.images.blur_hash.is_none()
    }
}
