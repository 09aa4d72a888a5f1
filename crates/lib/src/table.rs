//! Column version table: the authoritative current-winner cache.
//!
//! Maps each `(record, column)` cell to the version triple and
//! value-or-tombstone of the change that currently wins there. The table
//! carries no conflict logic of its own; the merge engine consults and
//! updates it through this thin layer over the [`Storage`] capability.

use std::sync::Arc;

use crate::Result;
use crate::backend::{Storage, StoredCell};
use crate::change::{CellKey, ColumnKey, RecordId, Value};

/// Per-record, per-column version state over a pluggable storage backend.
///
/// Cloning is cheap; clones share the same underlying store.
pub struct VersionTable<K, V> {
    storage: Arc<dyn Storage<K, V>>,
}

impl<K, V> Clone for VersionTable<K, V> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
        }
    }
}

impl<K, V> VersionTable<K, V>
where
    K: RecordId,
    V: Value,
{
    /// Create a table over the given storage backend.
    pub fn new(storage: Arc<dyn Storage<K, V>>) -> Self {
        Self { storage }
    }

    /// Current winner for a cell, if any change has ever been applied there.
    pub fn get(&self, key: &CellKey<K>) -> Result<Option<StoredCell<V>>> {
        self.storage.get(key)
    }

    /// Record a new winner for a cell. Used only by the merge engine.
    pub fn set(&self, key: CellKey<K>, cell: StoredCell<V>) -> Result<()> {
        self.storage.set(key, cell)
    }

    /// Whether any state exists for a cell.
    pub fn contains(&self, key: &CellKey<K>) -> Result<bool> {
        self.storage.contains(key)
    }

    /// The record-level tombstone for a record, if one is stored.
    pub fn record_tombstone(&self, record_id: &K) -> Result<Option<StoredCell<V>>> {
        Ok(self
            .storage
            .get(&CellKey::record(record_id.clone()))?
            .filter(StoredCell::is_tombstone))
    }

    /// Mint the next `col_version` for a local write to a column.
    ///
    /// Takes the maximum of the column's own lineage and the record-level
    /// tombstone, so a write issued after a local record deletion wins over
    /// the tombstone instead of being shadowed by it.
    pub fn next_col_version(&self, record_id: &K, column: &ColumnKey) -> Result<u64> {
        let cell = self
            .storage
            .get(&CellKey::column(record_id.clone(), column.clone()))?
            .map(|c| c.col_version)
            .unwrap_or(0);
        let tombstone = self
            .record_tombstone(record_id)?
            .map(|c| c.col_version)
            .unwrap_or(0);
        Ok(cell.max(tombstone) + 1)
    }

    /// Mint the `col_version` for a local record deletion.
    ///
    /// One past the maximum `col_version` across every cell of the record,
    /// so the tombstone causally dominates every locally known column edit.
    pub fn next_record_version(&self, record_id: &K) -> Result<u64> {
        let max = self
            .storage
            .scan_record(record_id)?
            .into_iter()
            .map(|(_, cell)| cell.col_version)
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    /// All stored cells for a record, including the record-level slot.
    pub fn scan_record(&self, record_id: &K) -> Result<Vec<(Option<ColumnKey>, StoredCell<V>)>> {
        self.storage.scan_record(record_id)
    }

    /// Highest `db_version` present in the underlying store.
    pub fn max_db_version(&self) -> Result<u64> {
        self.storage.max_db_version()
    }
}
