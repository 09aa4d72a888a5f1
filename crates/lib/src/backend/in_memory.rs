//! In-memory storage backend.
//!
//! Keeps all cell state in a `HashMap` behind an `RwLock`. This is the
//! default backend for tests and for deployments that rebuild state from a
//! peer on startup; durable backends implement the same [`Storage`] trait.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::Result;
use crate::backend::{CellState, Storage, StorageError, StoredCell};
use crate::change::{CellKey, ColumnKey, RecordId, Value};

/// Thread-safe in-memory implementation of [`Storage`].
#[derive(Debug, Default)]
pub struct InMemory<K, V> {
    cells: RwLock<HashMap<CellKey<K>, StoredCell<V>>>,
}

impl<K, V> InMemory<K, V>
where
    K: RecordId,
    V: Value,
{
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self {
            cells: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored cells (including tombstones).
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    /// Whether the store holds no cells at all.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<CellKey<K>, StoredCell<V>>>> {
        self.cells.read().map_err(|_| {
            StorageError::Unavailable {
                reason: "in-memory store lock poisoned".to_string(),
            }
            .into()
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<CellKey<K>, StoredCell<V>>>> {
        self.cells.write().map_err(|_| {
            StorageError::Unavailable {
                reason: "in-memory store lock poisoned".to_string(),
            }
            .into()
        })
    }
}

impl<K, V> Storage<K, V> for InMemory<K, V>
where
    K: RecordId,
    V: Value,
{
    fn get(&self, key: &CellKey<K>) -> Result<Option<StoredCell<V>>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn set(&self, key: CellKey<K>, cell: StoredCell<V>) -> Result<()> {
        self.write()?.insert(key, cell);
        Ok(())
    }

    fn contains(&self, key: &CellKey<K>) -> Result<bool> {
        Ok(self.read()?.contains_key(key))
    }

    fn scan_record(&self, record_id: &K) -> Result<Vec<(Option<ColumnKey>, StoredCell<V>)>> {
        Ok(self
            .read()?
            .iter()
            .filter(|(key, _)| &key.record_id == record_id)
            .map(|(key, cell)| (key.column.clone(), cell.clone()))
            .collect())
    }

    fn max_db_version(&self) -> Result<u64> {
        Ok(self
            .read()?
            .values()
            .map(|cell| cell.db_version)
            .max()
            .unwrap_or(0))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
