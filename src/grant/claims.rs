use jsonwebtoken::{Algorithm, EncodingKey, Header, Validation, encode};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

pub static VALIDATION: LazyLock<Validation> = LazyLock::new(|| {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation
});

/// Signed upload conditions: exactly this key, exactly this many bytes, before `exp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadClaims {
    pub key: String,
    pub size: u64,
    pub content_type: String,
    pub exp: u64,
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

impl UploadClaims {
    pub fn new(key: String, size: u64, content_type: String, expiry_secs: u64) -> Self {
        Self {
            key,
            size,
            content_type,
            exp: unix_now() + expiry_secs,
        }
    }

    pub fn encode_with_key(&self, key: &[u8]) -> jsonwebtoken::errors::Result<String> {
        encode(&Header::default(), &self, &EncodingKey::from_secret(key))
    }
}
