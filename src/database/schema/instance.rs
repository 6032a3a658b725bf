use anyhow::{Context, Result};
use redb::{ReadableTable, TableDefinition};
use std::sync::Arc;

use crate::database::Tree;
use crate::models::{PipelineInstance, PipelineState};

/// Durable cursor and context of every pipeline instance, keyed by instance id.
pub const INSTANCE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("instances");

#[derive(Clone)]
pub struct InstanceTable {
    tree: Arc<Tree>,
}

impl InstanceTable {
    pub fn new(tree: Arc<Tree>) -> Self {
        Self { tree }
    }

    pub fn save(&self, instance: &PipelineInstance) -> Result<()> {
        let txn = self.tree.begin_write()?;
        {
            let mut table = txn.open_table(INSTANCE_TABLE)?;
            table.insert(instance.id.as_str(), bitcode::encode(instance).as_slice())?;
        }
        txn.commit()
            .with_context(|| format!("failed to persist pipeline instance {}", instance.id))?;
        Ok(())
    }

    pub fn load(&self, id: &str) -> Result<Option<PipelineInstance>> {
        let txn = self.tree.begin_read()?;
        let table = txn.open_table(INSTANCE_TABLE)?;
        match table.get(id)? {
            Some(bytes) => Ok(Some(
                bitcode::decode(bytes.value())
                    .with_context(|| format!("failed to decode pipeline instance {}", id))?,
            )),
            None => Ok(None),
        }
    }

    pub fn list_where(&self, keep: impl Fn(&PipelineInstance) -> bool) -> Result<Vec<PipelineInstance>> {
        let txn = self.tree.begin_read()?;
        let table = txn.open_table(INSTANCE_TABLE)?;
        let mut instances = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let instance: PipelineInstance =
                bitcode::decode(value.value()).context("failed to decode pipeline instance")?;
            if keep(&instance) {
                instances.push(instance);
            }
        }
        Ok(instances)
    }

    /// Instances a restart has to pick up again.
    pub fn unfinished(&self) -> Result<Vec<PipelineInstance>> {
        self.list_where(|instance| !instance.state.is_terminal())
    }

    pub fn with_state(&self, state: PipelineState) -> Result<Vec<PipelineInstance>> {
        self.list_where(|instance| instance.state == state)
    }
}
