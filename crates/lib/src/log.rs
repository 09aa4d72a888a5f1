//! Append-only change log and diff producer.
//!
//! Every applied change is appended here, tagged with a `local_db_version`
//! minted from this node's logical clock at the moment of application. That
//! local sequence is what peers cursor against: `changes_since(cursor)`
//! answers "what have I applied since you last asked" without touching
//! remote clock domains, because a remote writer's `db_version` is not
//! orderable against local state.
//!
//! Append is the only mutation. A superseded change stays in the log as
//! history: a peer that has not yet seen the dominance decision can still
//! receive the old loser and will lose it to the recorded winner through the
//! same merge comparison, so the log never needs to prevent re-delivery.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::Result;
use crate::backend::StorageError;
use crate::change::{CellKey, Change, ChangeId, NodeId, RecordId, Value};
use crate::clock::LogicalClock;

/// A change plus the local clock value at which this node applied it.
///
/// `local_db_version` is pure local bookkeeping: it is never transmitted
/// and never participates in merge decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencedChange<K, V> {
    pub local_db_version: u64,
    pub change: Change<K, V>,
}

/// Ephemeral, process-local metadata about a change.
///
/// Lives in a side table keyed by [`ChangeId`] rather than on the change
/// itself, so the synchronized struct stays immutable and wire-clean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeFlags {
    /// The change was minted by this node's own write path.
    pub locally_originated: bool,
    /// The change has been handed to the transport at least once.
    pub broadcast: bool,
}

struct LogState<K, V> {
    /// Applied changes in ascending `local_db_version` order.
    entries: Vec<SequencedChange<K, V>>,
    /// Index of the latest applied change per cell, for point lookups.
    index: HashMap<CellKey<K>, usize>,
    /// Highest `db_version` seen per originating node.
    watermarks: HashMap<NodeId, u64>,
    /// Ephemeral flag side table.
    flags: HashMap<ChangeId, ChangeFlags>,
}

/// Ordered collection of applied changes, indexed by `local_db_version`.
///
/// The clock tick that assigns `local_db_version` happens inside the append
/// critical section, so log order and `local_db_version` order always agree
/// even under concurrent applies.
pub struct ChangeLog<K, V> {
    state: Mutex<LogState<K, V>>,
    clock: Arc<LogicalClock>,
}

impl<K, V> ChangeLog<K, V>
where
    K: RecordId,
    V: Value,
{
    /// Create an empty log sequenced by the given clock.
    pub fn new(clock: Arc<LogicalClock>) -> Self {
        Self {
            state: Mutex::new(LogState {
                entries: Vec::new(),
                index: HashMap::new(),
                watermarks: HashMap::new(),
                flags: HashMap::new(),
            }),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LogState<K, V>>> {
        self.state.lock().map_err(|_| {
            StorageError::Unavailable {
                reason: "change log lock poisoned".to_string(),
            }
            .into()
        })
    }

    /// Append an applied change and return the `local_db_version` assigned
    /// to it.
    pub fn append(&self, change: Change<K, V>, locally_originated: bool) -> Result<u64> {
        let mut state = self.lock()?;
        // Tick under the lock: local_db_version must be monotone in log
        // order.
        let local_db_version = self.clock.tick();
        let id = change.id();

        let watermark = state.watermarks.entry(change.node_id()).or_insert(0);
        *watermark = (*watermark).max(change.db_version());

        state.flags.insert(
            id,
            ChangeFlags {
                locally_originated,
                broadcast: false,
            },
        );

        let position = state.entries.len();
        state.index.insert(change.cell_key(), position);
        state.entries.push(SequencedChange {
            local_db_version,
            change,
        });
        Ok(local_db_version)
    }

    /// All changes applied after `cursor`, ascending by `local_db_version`.
    ///
    /// Exactly the entries with `local_db_version > cursor`, no gaps, no
    /// duplicates. Safe to re-run with the same cursor; the caller advances
    /// its cursor to the last returned `local_db_version`.
    pub fn changes_since(&self, cursor: u64) -> Result<Vec<SequencedChange<K, V>>> {
        let state = self.lock()?;
        let start = state
            .entries
            .partition_point(|entry| entry.local_db_version <= cursor);
        Ok(state.entries[start..].to_vec())
    }

    /// The latest applied change for a cell, if any.
    pub fn latest_for(&self, key: &CellKey<K>) -> Result<Option<Change<K, V>>> {
        let state = self.lock()?;
        Ok(state
            .index
            .get(key)
            .map(|&position| state.entries[position].change.clone()))
    }

    /// The `local_db_version` of the most recent append, or zero for an
    /// empty log.
    pub fn last_local_version(&self) -> Result<u64> {
        let state = self.lock()?;
        Ok(state
            .entries
            .last()
            .map(|entry| entry.local_db_version)
            .unwrap_or(0))
    }

    /// Number of applied changes in the log.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.entries.len())
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.entries.is_empty())
    }

    /// Highest `db_version` this node has applied from `node`, if any.
    pub fn highest_db_version(&self, node: NodeId) -> Result<Option<u64>> {
        Ok(self.lock()?.watermarks.get(&node).copied())
    }

    /// Mark changes as handed to the transport.
    pub fn mark_broadcast(&self, ids: &[ChangeId]) -> Result<()> {
        let mut state = self.lock()?;
        for id in ids {
            state.flags.entry(*id).or_default().broadcast = true;
        }
        Ok(())
    }

    /// Whether a change has been handed to the transport.
    pub fn is_broadcast(&self, id: ChangeId) -> Result<bool> {
        Ok(self
            .lock()?
            .flags
            .get(&id)
            .map(|flags| flags.broadcast)
            .unwrap_or(false))
    }

    /// Whether a change was minted by this node's own write path.
    pub fn is_locally_originated(&self, id: ChangeId) -> Result<bool> {
        Ok(self
            .lock()?
            .flags
            .get(&id)
            .map(|flags| flags.locally_originated)
            .unwrap_or(false))
    }
}
