use serde::{Deserialize, Serialize};

/// Prefix filter applied to object-creation notifications.
pub const TRIGGER_PREFIX: &str = "original";

/// Object-creation notification consumed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadEvent {
    pub bucket: String,
    pub key: String,
}

impl UploadEvent {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Derivatives such as `normalized_*` never start a pipeline.
    pub fn is_qualifying(&self) -> bool {
        self.key.starts_with(TRIGGER_PREFIX)
    }
}
