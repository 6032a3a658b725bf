//! Upload grant issuer: validates a requested content type and size, generates the
//! image identity and hands out a short-lived token bound to `original_{id}.{ext}`.

pub mod claims;

use jsonwebtoken::{DecodingKey, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::extension_for_content_type;
use crate::config::AppConfig;
use crate::models::{ImageId, KeyPrefix, ObjectKey};
use claims::{UploadClaims, VALIDATION};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrantError {
    #[error("invalid grant request: {0}")]
    InvalidRequest(String),
    #[error("failed to generate upload grant: {0}")]
    Generation(String),
    #[error("upload rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRequest {
    pub size: u64,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantFields {
    pub key: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadGrant {
    pub url: String,
    pub fields: GrantFields,
    pub id: ImageId,
}

pub struct GrantIssuer {
    secret: Vec<u8>,
    url: String,
    expiry_secs: u64,
}

impl GrantIssuer {
    pub fn new(secret: Vec<u8>, url: impl Into<String>, expiry_secs: u64) -> Self {
        Self {
            secret,
            url: url.into(),
            expiry_secs,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let url = format!("{}/upload", config.public_url.trim_end_matches('/'));
        Self::new(config.jwt_secret_key(), url, config.grant_expiry_secs)
    }

    pub fn parse_request(body: &str) -> Result<GrantRequest, GrantError> {
        if body.trim().is_empty() {
            return Err(GrantError::InvalidRequest("missing body".to_string()));
        }
        serde_json::from_str(body).map_err(|err| GrantError::InvalidRequest(err.to_string()))
    }

    pub fn issue(&self, request: &GrantRequest) -> Result<UploadGrant, GrantError> {
        let ext = extension_for_content_type(&request.content_type).ok_or_else(|| {
            GrantError::InvalidRequest(format!("unsupported content type `{}`", request.content_type))
        })?;
        if request.size == 0 {
            return Err(GrantError::InvalidRequest("size must be positive".to_string()));
        }

        let id = ImageId::generate();
        let key = ObjectKey::new(KeyPrefix::Original, id, ext).to_string();
        let token = UploadClaims::new(
            key.clone(),
            request.size,
            request.content_type.clone(),
            self.expiry_secs,
        )
        .encode_with_key(&self.secret)
        .map_err(|err| GrantError::Generation(err.to_string()))?;

        Ok(UploadGrant {
            url: self.url.clone(),
            fields: GrantFields { key, token },
            id,
        })
    }

    /// Checks an upload against its grant: signature, expiry, exact key and exact size.
    pub fn verify(&self, token: &str, key: &str, size: u64) -> Result<UploadClaims, GrantError> {
        let claims = decode::<UploadClaims>(token, &DecodingKey::from_secret(&self.secret), &VALIDATION)
            .map_err(|err| GrantError::Rejected(format!("invalid token: {err}")))?
            .claims;
        if claims.key != key {
            return Err(GrantError::Rejected(format!(
                "key `{key}` does not match granted key `{}`",
                claims.key
            )));
        }
        if claims.size != size {
            return Err(GrantError::Rejected(format!(
                "size {size} does not match granted size {}",
                claims.size
            )));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity::extract_identity;

    fn issuer() -> GrantIssuer {
        GrantIssuer::new(b"test-secret".to_vec(), "http://localhost/upload", 300)
    }

    fn request(content_type: &str, size: u64) -> GrantRequest {
        GrantRequest {
            size,
            content_type: content_type.to_string(),
        }
    }

    #[test]
    fn grant_key_embeds_generated_identity() {
        let grant = issuer().issue(&request("image/jpeg", 1024)).unwrap();

        assert_eq!(grant.fields.key, format!("original_{}.jpeg", grant.id));
        assert_eq!(grant.id.as_str().len(), 26);
        assert_eq!(
            extract_identity(&grant.fields.key, KeyPrefix::Original).unwrap(),
            grant.id
        );
        assert_eq!(grant.url, "http://localhost/upload");
    }

    #[test]
    fn rejects_unknown_content_types_and_bad_bodies() {
        let issuer = issuer();
        assert!(matches!(
            issuer.issue(&request("image/gif", 10)),
            Err(GrantError::InvalidRequest(_))
        ));
        assert!(matches!(
            issuer.issue(&request("image/png", 0)),
            Err(GrantError::InvalidRequest(_))
        ));
        assert!(matches!(
            GrantIssuer::parse_request(""),
            Err(GrantError::InvalidRequest(_))
        ));
        assert!(matches!(
            GrantIssuer::parse_request(r#"{"size": 10}"#),
            Err(GrantError::InvalidRequest(_))
        ));
        assert_eq!(
            GrantIssuer::parse_request(r#"{"size": 10, "contentType": "image/webp"}"#).unwrap(),
            request("image/webp", 10)
        );
    }

    #[test]
    fn only_decodable_content_types_are_granted() {
        let issuer = issuer();
        for content_type in ["image/jpeg", "image/png", "image/webp"] {
            assert!(issuer.issue(&request(content_type, 10)).is_ok(), "{content_type}");
        }
        assert!(matches!(
            issuer.issue(&request("image/avif", 10)),
            Err(GrantError::InvalidRequest(_))
        ));
    }

    #[test]
    fn verify_enforces_exact_key_and_size() {
        let issuer = issuer();
        let grant = issuer.issue(&request("image/png", 2048)).unwrap();
        let token = &grant.fields.token;

        let claims = issuer.verify(token, &grant.fields.key, 2048).unwrap();
        assert_eq!(claims.content_type, "image/png");

        assert!(matches!(
            issuer.verify(token, &grant.fields.key, 2047),
            Err(GrantError::Rejected(_))
        ));
        assert!(matches!(
            issuer.verify(token, "original_OTHER.png", 2048),
            Err(GrantError::Rejected(_))
        ));
        assert!(matches!(
            GrantIssuer::new(b"other".to_vec(), "u", 300).verify(token, &grant.fields.key, 2048),
            Err(GrantError::Rejected(_))
        ));
    }

    #[test]
    fn expired_grants_are_rejected() {
        let issuer = issuer();
        let mut claims = UploadClaims::new("original_OLD.png".to_string(), 5, "image/png".to_string(), 0);
        claims.exp -= 10;
        let token = claims.encode_with_key(b"test-secret").unwrap();

        assert!(matches!(
            issuer.verify(&token, "original_OLD.png", 5),
            Err(GrantError::Rejected(_))
        ));
    }
}
