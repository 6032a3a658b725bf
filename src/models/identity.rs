use arrayvec::ArrayString;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("object key `{key}` does not start with `{prefix}`")]
    MissingPrefix { key: String, prefix: &'static str },
    #[error("object key `{0}` has no file extension")]
    MissingExtension(String),
    #[error("invalid image identity `{0}`")]
    InvalidIdentity(String),
}

/// Naming convention shared by the grant issuer, the transform worker and the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyPrefix {
    Original,
    Normalized,
}

impl KeyPrefix {
    pub const fn as_str(self) -> &'static str {
        match self {
            KeyPrefix::Original => "original_",
            KeyPrefix::Normalized => "normalized_",
        }
    }
}

/// Opaque identity of one uploaded image, also the metadata record's primary key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, bitcode::Encode, bitcode::Decode,
)]
#[serde(transparent)]
pub struct ImageId(ArrayString<64>);

impl ImageId {
    pub fn generate() -> Self {
        // A ULID renders to 26 Crockford base32 characters, always within capacity.
        let mut inner = ArrayString::new();
        inner.push_str(&Ulid::new().to_string());
        Self(inner)
    }

    pub fn parse(raw: impl AsRef<str>) -> Result<Self, KeyError> {
        let raw = raw.as_ref();
        let invalid = raw.is_empty()
            || raw.contains('.')
            || raw.contains('/')
            || raw.contains(KeyPrefix::Original.as_str())
            || raw.contains(KeyPrefix::Normalized.as_str());
        if invalid {
            return Err(KeyError::InvalidIdentity(raw.to_string()));
        }
        ArrayString::from(raw)
            .map(Self)
            .map_err(|_| KeyError::InvalidIdentity(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `{prefix}{id}.{ext}` object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey {
    pub prefix: KeyPrefix,
    pub id: ImageId,
    pub ext: String,
}

impl ObjectKey {
    pub fn new(prefix: KeyPrefix, id: ImageId, ext: impl Into<String>) -> Self {
        Self {
            prefix,
            id,
            ext: ext.into(),
        }
    }

    /// Strips the prefix and the trailing extension, leaving the identity.
    pub fn parse(key: &str, prefix: KeyPrefix) -> Result<Self, KeyError> {
        let rest = key
            .strip_prefix(prefix.as_str())
            .ok_or_else(|| KeyError::MissingPrefix {
                key: key.to_string(),
                prefix: prefix.as_str(),
            })?;
        let (id, ext) = rest
            .rsplit_once('.')
            .filter(|(_, ext)| !ext.is_empty())
            .ok_or_else(|| KeyError::MissingExtension(key.to_string()))?;
        Ok(Self {
            prefix,
            id: ImageId::parse(id)?,
            ext: ext.to_string(),
        })
    }

    /// Same identity and extension under another prefix.
    pub fn with_prefix(&self, prefix: KeyPrefix) -> Self {
        Self {
            prefix,
            id: self.id,
            ext: self.ext.clone(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}.{}", self.prefix.as_str(), self.id, self.ext)
    }
}

pub fn extract_identity(key: &str, prefix: KeyPrefix) -> Result<ImageId, KeyError> {
    ObjectKey::parse(key, prefix).map(|parsed| parsed.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn original_and_normalized_keys_share_identity() {
        for ext in ["jpeg", "png", "webp"] {
            let id = ImageId::generate();
            let original = ObjectKey::new(KeyPrefix::Original, id, ext).to_string();
            let normalized = ObjectKey::new(KeyPrefix::Normalized, id, ext).to_string();

            assert_eq!(original, format!("original_{id}.{ext}"));
            assert_eq!(extract_identity(&original, KeyPrefix::Original).unwrap(), id);
            assert_eq!(
                extract_identity(&normalized, KeyPrefix::Normalized).unwrap(),
                id
            );
        }
    }

    #[test]
    fn parses_short_identities() {
        let parsed = ObjectKey::parse("original_ABC123.png", KeyPrefix::Original).unwrap();
        assert_eq!(parsed.id.as_str(), "ABC123");
        assert_eq!(parsed.ext, "png");
    }

    #[test]
    fn prefix_swap_keeps_identity_and_extension() {
        let parsed = ObjectKey::parse("original_01H7S3FH5MKK4SN20TPKGQ9EPK.jpeg", KeyPrefix::Original)
            .unwrap();
        assert_eq!(
            parsed.with_prefix(KeyPrefix::Normalized).to_string(),
            "normalized_01H7S3FH5MKK4SN20TPKGQ9EPK.jpeg"
        );
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(matches!(
            ObjectKey::parse("normalized_ABC.png", KeyPrefix::Original),
            Err(KeyError::MissingPrefix { .. })
        ));
        assert!(matches!(
            ObjectKey::parse("original_ABC", KeyPrefix::Original),
            Err(KeyError::MissingExtension(_))
        ));
        assert!(matches!(
            ObjectKey::parse("original_ABC.", KeyPrefix::Original),
            Err(KeyError::MissingExtension(_))
        ));
        assert!(matches!(
            ObjectKey::parse("original_.png", KeyPrefix::Original),
            Err(KeyError::InvalidIdentity(_))
        ));
        assert!(matches!(
            ObjectKey::parse("original_A.B.png", KeyPrefix::Original),
            Err(KeyError::InvalidIdentity(_))
        ));
    }
}
