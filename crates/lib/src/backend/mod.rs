//! Durable keyed storage for the version table.
//!
//! This module defines the [`Storage`] trait, the capability the merge core
//! consumes for persisting per-cell winner state. Implementations decide how
//! cells are actually persisted (in memory, on disk, in an embedded
//! database); the core only ever issues point reads, point writes, and
//! per-record scans through this trait, which keeps the merge logic
//! independent of the storage mechanism.

use crate::Result;
use crate::change::{CellKey, ColumnKey, NodeId, RecordId, Value};
use serde::{Deserialize, Serialize};
use std::any::Any;

pub mod errors;
pub mod in_memory;

pub use errors::StorageError;
pub use in_memory::InMemory;

/// Current-winner state of one cell: a live value or a tombstone.
///
/// Column cells carry `Live` after a put and `Tombstone` after a column
/// deletion; the record-level slot only ever carries `Tombstone` (record
/// creation is implicit, so there is no record-level live state to store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellState<V> {
    /// The cell holds a value.
    Live(V),
    /// The cell (or record, for the record-level slot) has been deleted.
    Tombstone,
}

impl<V> CellState<V> {
    /// The live value, if any.
    pub fn value(&self) -> Option<&V> {
        match self {
            CellState::Live(v) => Some(v),
            CellState::Tombstone => None,
        }
    }

    /// Whether this cell is a deletion marker.
    pub fn is_tombstone(&self) -> bool {
        matches!(self, CellState::Tombstone)
    }
}

/// The stored winner for a cell, as decided by the merge rules.
///
/// Holds the full version triple of the winning change so that any later
/// change for the same cell can be compared without consulting the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCell<V> {
    pub col_version: u64,
    pub db_version: u64,
    pub node_id: NodeId,
    pub state: CellState<V>,
}

impl<V> StoredCell<V> {
    /// The lexicographic comparison key matching
    /// [`crate::change::Change::version`].
    pub fn version(&self) -> (u64, u64, NodeId) {
        (self.col_version, self.db_version, self.node_id)
    }

    /// Whether the stored state is a deletion marker.
    pub fn is_tombstone(&self) -> bool {
        self.state.is_tombstone()
    }
}

/// Storage trait abstracting the durable keyed store backing the version
/// table.
///
/// Implementations must be `Send + Sync` so a replica can be shared across
/// threads, and implement `Any` to allow downcasting to a concrete backend
/// when implementation-specific access is needed.
///
/// Every method returns `Result` so that an unavailable backing store
/// surfaces as [`StorageError::Unavailable`], which callers of
/// `write`/`apply` may retry. Implementations must make each `set` atomic;
/// the caller guarantees `set` for a given record is never invoked
/// concurrently (the merge engine serializes per record).
pub trait Storage<K, V>: Send + Sync + Any
where
    K: RecordId,
    V: Value,
{
    /// Point lookup of the current winner for a cell.
    fn get(&self, key: &CellKey<K>) -> Result<Option<StoredCell<V>>>;

    /// Overwrite the current winner for a cell. Used only by the merge
    /// engine.
    fn set(&self, key: CellKey<K>, cell: StoredCell<V>) -> Result<()>;

    /// Whether a cell has any stored state.
    fn contains(&self, key: &CellKey<K>) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// All stored cells of one record, including the record-level slot.
    ///
    /// Used to mint record-tombstone versions that dominate every locally
    /// known column, and for record-liveness reads.
    fn scan_record(&self, record_id: &K) -> Result<Vec<(Option<ColumnKey>, StoredCell<V>)>>;

    /// The highest `db_version` present in the store, used to seed the
    /// logical clock on startup. Zero for an empty store.
    fn max_db_version(&self) -> Result<u64>;

    /// Returns a reference to the backend as a dynamic `Any` type, allowing
    /// downcasting to a concrete implementation.
    fn as_any(&self) -> &dyn Any;
}
