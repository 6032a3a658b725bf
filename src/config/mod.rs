use anyhow::{Context, Result};
use dotenv::dotenv;
use log::info;
use rand::{TryRngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{LazyLock, OnceLock};
use std::time::Duration;

use crate::common::{
    DATABASE_FILE, DEFAULT_GRANT_EXPIRY_SECS, DEFAULT_MAX_TRANSFORM_ATTEMPTS,
    DEFAULT_RETRY_BACKOFF_MS, DEFAULT_TRANSFORM_TIMEOUT_SECS,
};

pub const ENV_PREFIX: &str = "MINIINSTA_";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Root of the local object store and the redb file
    pub data_dir: PathBuf,
    /// Bucket uploads are written to
    pub bucket: String,
    /// Base URL handed out in upload grants
    pub public_url: String,
    /// Upload grant signing secret; a random per-process key is used when unset
    pub auth_key: Option<String>,
    pub grant_expiry_secs: u64,
    pub transform_timeout_secs: u64,
    pub max_transform_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Fail the pipeline instead of passing an empty result through when the source is gone
    pub missing_source_is_error: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bucket: "images".to_string(),
            public_url: "http://127.0.0.1:8000".to_string(),
            auth_key: None,
            grant_expiry_secs: DEFAULT_GRANT_EXPIRY_SECS,
            transform_timeout_secs: DEFAULT_TRANSFORM_TIMEOUT_SECS,
            max_transform_attempts: DEFAULT_MAX_TRANSFORM_ATTEMPTS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            missing_source_is_error: false,
        }
    }
}

pub static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

static FALLBACK_SECRET_KEY: LazyLock<Vec<u8>> = LazyLock::new(|| {
    let mut secret = vec![0u8; 32];
    OsRng
        .try_fill_bytes(&mut secret)
        .expect("Failed to generate random secret key");
    secret
});

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        envy::prefixed(ENV_PREFIX)
            .from_env::<AppConfig>()
            .context("failed to read configuration from environment")
    }

    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter::<_, AppConfig>(pairs)
            .context("failed to read configuration")
    }

    pub fn jwt_secret_key(&self) -> Vec<u8> {
        match self.auth_key.as_ref() {
            Some(auth_key) => auth_key.as_bytes().to_vec(),
            None => FALLBACK_SECRET_KEY.clone(),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.data_dir.join("objects")
    }

    pub fn transform_timeout(&self) -> Duration {
        Duration::from_secs(self.transform_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Loads the configuration once for the whole process.
pub fn init_config() -> Result<&'static AppConfig> {
    let config = AppConfig::from_env()?;
    info!("Loaded config: bucket={}, data_dir={:?}", config.bucket, config.data_dir);
    Ok(APP_CONFIG.get_or_init(|| config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(key: &str, value: &str) -> (String, String) {
        (format!("{ENV_PREFIX}{key}"), value.to_string())
    }

    #[test]
    fn missing_variables_fall_back_to_defaults() {
        let config = AppConfig::from_pairs(Vec::new()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.transform_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn prefixed_variables_override_defaults() {
        let config = AppConfig::from_pairs(vec![
            pair("BUCKET", "uploads"),
            pair("MAX_TRANSFORM_ATTEMPTS", "5"),
            pair("MISSING_SOURCE_IS_ERROR", "true"),
            pair("AUTH_KEY", "secret"),
            ("UNRELATED".to_string(), "x".to_string()),
        ])
        .unwrap();

        assert_eq!(config.bucket, "uploads");
        assert_eq!(config.max_transform_attempts, 5);
        assert!(config.missing_source_is_error);
        assert_eq!(config.jwt_secret_key(), b"secret".to_vec());
    }
}
