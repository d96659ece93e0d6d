//! In-memory entity store

use crate::domain::shared::{DomainError, Result};
use crate::domain::store::{EntityKind, EntityStore};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

type Table = BTreeMap<String, Vec<u8>>;

/// Entity store kept in process memory.
///
/// Every operation takes the lock once, so single-record writes are atomic
/// and reads see all completed writes.
#[derive(Default)]
pub struct MemoryEntityStore {
    tables: RwLock<HashMap<EntityKind, Table>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Vec<u8>>> {
        let tables = self.tables.read().await;
        Ok(tables.get(&kind).and_then(|t| t.get(id)).cloned())
    }

    async fn insert(&self, kind: EntityKind, id: &str, data: Vec<u8>) -> Result<()> {
        let mut tables = self.tables.write().await;
        let table = tables.entry(kind).or_default();
        if table.contains_key(id) {
            return Err(DomainError::AlreadyExists(format!("{} {}", kind, id)));
        }
        table.insert(id.to_string(), data);
        debug!("Stored {} {}", kind, id);
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables
            .get_mut(&kind)
            .map(|t| t.remove(id).is_some())
            .unwrap_or(false);
        if removed {
            debug!("Removed {} {}", kind, id);
        }
        Ok(removed)
    }

    async fn list(&self, kind: EntityKind) -> Result<Vec<Vec<u8>>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&kind)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
