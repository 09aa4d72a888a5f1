//! Replica: the per-node entry point tying the core together.
//!
//! A [`Replica`] owns the node identity, logical clock, version table,
//! change log, and merge engine, and exposes the three-operation surface the
//! application layer consumes: `write` for local mutations, `apply_remote`
//! for inbound changes, and `changes_since` for producing diffs.

use std::sync::Arc;

use crate::backend::{InMemory, Storage};
use crate::change::{Change, ColumnKey, NodeId, Op, RecordId, Value, WireChange};
use crate::clock::LogicalClock;
use crate::log::{ChangeLog, SequencedChange};
use crate::merge::{MergeEngine, Origin, Outcome};
use crate::table::VersionTable;
use crate::Result;

/// One node's view of the replicated store.
///
/// Cheap to share: wrap in an `Arc` and call from any thread. Writes to
/// different records proceed concurrently; writes to the same record
/// serialize inside the merge engine.
pub struct Replica<K, V> {
    node_id: NodeId,
    clock: Arc<LogicalClock>,
    table: VersionTable<K, V>,
    log: Arc<ChangeLog<K, V>>,
    engine: MergeEngine<K, V>,
}

impl<K, V> Replica<K, V>
where
    K: RecordId,
    V: Value,
{
    /// Open a replica over the given storage backend.
    ///
    /// The logical clock is seeded from the highest `db_version` present in
    /// storage, so `db_version`s are never reused across restarts.
    pub fn open(node_id: NodeId, storage: Arc<dyn Storage<K, V>>) -> Result<Self> {
        let seed = storage.max_db_version()?;
        let clock = Arc::new(LogicalClock::new(seed));
        let table = VersionTable::new(storage);
        let log = Arc::new(ChangeLog::new(clock.clone()));
        let engine = MergeEngine::new(table.clone(), log.clone(), clock.clone());
        Ok(Self {
            node_id,
            clock,
            table,
            log,
            engine,
        })
    }

    /// Open a replica backed by a fresh in-memory store.
    pub fn in_memory(node_id: NodeId) -> Result<Self> {
        Self::open(node_id, Arc::new(InMemory::new()))
    }

    /// This replica's node identity.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Handle to this replica's logical clock.
    pub fn clock(&self) -> &Arc<LogicalClock> {
        &self.clock
    }

    /// Handle to this replica's change log.
    pub fn log(&self) -> &Arc<ChangeLog<K, V>> {
        &self.log
    }

    /// Apply a local mutation.
    ///
    /// Mints a fresh `col_version` for the targeted cell and a `db_version`
    /// from the logical clock, applies the change through the merge engine,
    /// and returns the recorded change ready for broadcast.
    pub fn write(&self, record_id: K, op: Op<V>) -> Result<Change<K, V>> {
        self.engine.write_local(self.node_id, record_id, op)
    }

    /// Set a column value on a record.
    pub fn put(
        &self,
        record_id: K,
        column: impl Into<ColumnKey>,
        value: V,
    ) -> Result<Change<K, V>> {
        self.write(
            record_id,
            Op::Put {
                column: column.into(),
                value,
            },
        )
    }

    /// Delete a single column of a record.
    pub fn delete_column(&self, record_id: K, column: impl Into<ColumnKey>) -> Result<Change<K, V>> {
        self.write(
            record_id,
            Op::DeleteColumn {
                column: column.into(),
            },
        )
    }

    /// Delete a whole record.
    pub fn delete_record(&self, record_id: K) -> Result<Change<K, V>> {
        self.write(record_id, Op::DeleteRecord)
    }

    /// Apply a change received from a peer.
    pub fn apply_remote(&self, change: Change<K, V>) -> Result<Outcome> {
        self.engine.apply(&change, Origin::Remote)
    }

    /// Validate and apply a wire-encoded change received from a peer.
    pub fn apply_wire(&self, wire: WireChange<K, V>) -> Result<Outcome> {
        let change = wire.into_change()?;
        self.apply_remote(change)
    }

    /// All changes this node has applied after `cursor`, ascending by
    /// `local_db_version`. The diff a peer at `cursor` is missing.
    pub fn changes_since(&self, cursor: u64) -> Result<Vec<SequencedChange<K, V>>> {
        self.log.changes_since(cursor)
    }

    /// The cursor position representing everything applied so far.
    pub fn last_local_version(&self) -> Result<u64> {
        self.log.last_local_version()
    }

    /// Read the current value of a column, honoring tombstones.
    ///
    /// Returns `None` if the column was never written, was deleted, or is
    /// shadowed by a record-level tombstone with a higher `col_version`.
    pub fn get(&self, record_id: &K, column: impl Into<ColumnKey>) -> Result<Option<V>> {
        let key = crate::change::CellKey::column(record_id.clone(), column.into());
        let Some(cell) = self.table.get(&key)? else {
            return Ok(None);
        };
        if let Some(tombstone) = self.table.record_tombstone(record_id)?
            && tombstone.col_version > cell.col_version
        {
            return Ok(None);
        }
        Ok(cell.state.value().cloned())
    }

    /// Whether a record is currently deleted: a record-level tombstone is
    /// stored and no live column matches or exceeds its `col_version`.
    ///
    /// The `>=` mirrors the shadowing rule in [`Replica::get`]: the merge
    /// only ignores column changes strictly below the tombstone, so a column
    /// that ties survives and the record reads as live.
    pub fn is_record_deleted(&self, record_id: &K) -> Result<bool> {
        let Some(tombstone) = self.table.record_tombstone(record_id)? else {
            return Ok(false);
        };
        let resurrected = self
            .table
            .scan_record(record_id)?
            .into_iter()
            .any(|(column, cell)| {
                column.is_some()
                    && !cell.is_tombstone()
                    && cell.col_version >= tombstone.col_version
            });
        Ok(!resurrected)
    }
}
