pub mod create;

use anyhow::Result;
use redb::Database;

/// Handle on the single redb file holding image records and pipeline instances.
pub struct Tree {
    pub in_disk: Database,
}

impl Tree {
    pub fn begin_read(&self) -> Result<redb::ReadTransaction> {
        Ok(self.in_disk.begin_read()?)
    }

    pub fn begin_write(&self) -> Result<redb::WriteTransaction> {
        Ok(self.in_disk.begin_write()?)
    }
}
