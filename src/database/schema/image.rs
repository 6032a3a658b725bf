use anyhow::{Context, Result};
use redb::{ReadableTable, TableDefinition};
use std::sync::Arc;
use thiserror::Error;

use crate::database::Tree;
use crate::models::{ImageId, ImageRecord};

/// One row per image identity, bitcode-encoded `ImageRecord`.
pub const IMAGE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("images");

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("image record `{0}` already exists")]
    AlreadyExists(ImageId),
    #[error("image record `{0}` does not exist")]
    NotFound(ImageId),
}

/// Metadata store access layer. Both mutations are single write transactions.
#[derive(Clone)]
pub struct ImageTable {
    tree: Arc<Tree>,
}

impl ImageTable {
    pub fn new(tree: Arc<Tree>) -> Self {
        Self { tree }
    }

    pub fn get(&self, id: ImageId) -> Result<Option<ImageRecord>> {
        let txn = self.tree.begin_read()?;
        let table = txn.open_table(IMAGE_TABLE)?;
        match table.get(id.as_str())? {
            Some(bytes) => {
                let record = bitcode::decode(bytes.value())
                    .with_context(|| format!("failed to decode image record {}", id))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Conditional put: fails with `RecordError::AlreadyExists` when the identity is taken.
    pub fn create(&self, record: &ImageRecord) -> Result<()> {
        let key = record.pk;
        let txn = self.tree.begin_write()?;
        let exists = {
            let mut table = txn.open_table(IMAGE_TABLE)?;
            let exists = table.get(key.as_str())?.is_some();
            if !exists {
                table.insert(key.as_str(), bitcode::encode(record).as_slice())?;
            }
            exists
        };
        if exists {
            txn.abort()?;
            return Err(RecordError::AlreadyExists(key).into());
        }
        txn.commit()
            .with_context(|| format!("failed to commit image record {}", key))?;
        Ok(())
    }

    /// Sets `images.normalized` and `images.blurHash` together on an existing record.
    pub fn set_derived(
        &self,
        id: ImageId,
        normalized: Option<&str>,
        blur_hash: Option<&str>,
    ) -> Result<ImageRecord> {
        let txn = self.tree.begin_write()?;
        let updated = {
            let mut table = txn.open_table(IMAGE_TABLE)?;
            let current: Option<ImageRecord> = match table.get(id.as_str())? {
                Some(bytes) => Some(
                    bitcode::decode(bytes.value())
                        .with_context(|| format!("failed to decode image record {}", id))?,
                ),
                None => None,
            };
            match current {
                Some(mut record) => {
                    record.images.normalized = normalized.map(str::to_string);
                    record.images.blur_hash = blur_hash.map(str::to_string);
                    record.updated_at = Some(chrono::Utc::now().timestamp_millis());
                    table.insert(id.as_str(), bitcode::encode(&record).as_slice())?;
                    Some(record)
                }
                None => None,
            }
        };
        match updated {
            Some(record) => {
                txn.commit()
                    .with_context(|| format!("failed to commit image record {}", id))?;
                Ok(record)
            }
            None => {
                txn.abort()?;
                Err(RecordError::NotFound(id).into())
            }
        }
    }
}
