use anyhow::{Context, Result};
use log::info;
use redb::Database;
use std::path::Path;

use super::Tree;
use crate::database::schema::image::IMAGE_TABLE;
use crate::database::schema::instance::INSTANCE_TABLE;

impl Tree {
    /// Opens (or creates) the database file and makes sure every table exists,
    /// so read transactions never hit a missing table.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory tree {:?}", parent))?;
        }
        let db = Database::create(path)
            .with_context(|| format!("failed to create database at {:?}", path))?;
        let tree = Self { in_disk: db };

        info!("Initializing database tables...");
        let txn = tree.begin_write()?;
        let _ = txn.open_table(IMAGE_TABLE)?;
        let _ = txn.open_table(INSTANCE_TABLE)?;
        txn.commit()?;
        info!("Database tables initialized successfully.");

        Ok(tree)
    }
}
