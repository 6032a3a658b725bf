use anyhow::{Context, Result, bail};
use path_clean::PathClean;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use ulid::Ulid;

use super::ObjectStore;

/// Filesystem-backed object store laid out as `root/{bucket}/{key}`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        for part in [bucket, key] {
            let cleaned = Path::new(part).clean();
            let escapes = part.is_empty()
                || cleaned.is_absolute()
                || cleaned
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_)));
            if escapes {
                bail!("invalid object location `{}/{}`", bucket, key);
            }
        }
        Ok(self.root.join(bucket).join(Path::new(key).clean()))
    }
}

impl ObjectStore for LocalObjectStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.object_path(bucket, key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read object {:?}", path)),
        }
    }

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory tree {:?}", parent))?;
        }
        // Readers must never observe a half-written object.
        let path_tmp = path.with_file_name(format!(".{}.tmp", Ulid::new()));
        fs::write(&path_tmp, bytes)
            .with_context(|| format!("failed to write temporary object {:?}", path_tmp))?;
        fs::rename(&path_tmp, &path)
            .with_context(|| format!("failed to move object into place at {:?}", path))?;
        Ok(())
    }
}
