pub mod local;

use anyhow::Result;

pub use local::LocalObjectStore;

/// Blob storage the transform worker reads originals from and writes derivatives to.
pub trait ObjectStore: Send + Sync {
    /// `Ok(None)` when no object exists under `key`.
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<()>;
}
