//! Merge engine: applies changes and decides winners.
//!
//! For every incoming change the engine compares the
//! `(col_version, db_version, node_id)` triple against the stored winner for
//! the same cell and keeps the lexicographically greater one. The comparison
//! is deterministic and uses no side information, so every node converges on
//! the same winner for any pair of conflicting changes, independent of
//! arrival order — the application order of a set of changes is commutative,
//! associative, and idempotent.
//!
//! Record-level tombstones get one extra rule: a column change whose
//! `col_version` is below the record's tombstone version is ignored outright,
//! so a record deletion causally dominates column edits it had not yet seen.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::Result;
use crate::backend::{CellState, StoredCell};
use crate::change::{Change, NodeId, Op, RecordId, Value};
use crate::clock::LogicalClock;
use crate::log::ChangeLog;
use crate::table::VersionTable;

pub mod errors;

pub use errors::MergeError;

/// Number of per-record locks. Applies to different records proceed
/// concurrently; applies to the same record serialize on one stripe.
const LOCK_STRIPES: usize = 64;

/// Classification of a single `apply` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The change won and is now the stored state for its cell.
    Applied,
    /// The stored state already dominates (or equals) the change.
    Superseded,
    /// A record-level tombstone causally dominates the change.
    Ignored,
}

/// Where a change entering the engine came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Minted by this node's own write path.
    Local,
    /// Received from a peer.
    Remote,
}

/// Applies changes against the version table, deciding winners and keeping
/// the change log current.
///
/// `apply` is safe under concurrent invocation; the read-modify-write per
/// cell is made atomic by per-record mutex stripes.
pub struct MergeEngine<K, V> {
    table: VersionTable<K, V>,
    log: Arc<ChangeLog<K, V>>,
    clock: Arc<LogicalClock>,
    stripes: Vec<Mutex<()>>,
}

impl<K, V> MergeEngine<K, V>
where
    K: RecordId,
    V: Value,
{
    /// Create an engine over the given table, log, and clock.
    pub fn new(
        table: VersionTable<K, V>,
        log: Arc<ChangeLog<K, V>>,
        clock: Arc<LogicalClock>,
    ) -> Self {
        Self {
            table,
            log,
            clock,
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    fn stripe(&self, record_id: &K) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        record_id.hash(&mut hasher);
        &self.stripes[(hasher.finish() as usize) % LOCK_STRIPES]
    }

    /// Apply one change, returning how it was classified.
    ///
    /// Exactly one of {new state written, no-op} happens per call, and a log
    /// entry is appended if and only if the outcome is [`Outcome::Applied`].
    /// Remote changes advance the logical clock whether or not they win.
    pub fn apply(&self, change: &Change<K, V>, origin: Origin) -> Result<Outcome> {
        if origin == Origin::Remote {
            self.clock.observe(change.db_version());
        }

        let _guard = self
            .stripe(change.record_id())
            .lock()
            .map_err(|_| MergeError::EngineUnavailable)?;

        // Record-level tombstone precedence: a later record deletion
        // dominates column edits it had not yet seen.
        if !change.is_record_level()
            && let Some(tombstone) = self.table.record_tombstone(change.record_id())?
            && tombstone.col_version > change.col_version()
        {
            trace!(
                node = %change.node_id(),
                db_version = change.db_version(),
                tombstone_version = tombstone.col_version,
                "column change dominated by record tombstone"
            );
            return Ok(Outcome::Ignored);
        }

        let key = change.cell_key();
        match self.table.get(&key)? {
            None => {
                self.commit(change, origin)?;
                Ok(Outcome::Applied)
            }
            Some(stored) => {
                let incoming = change.version();
                let current = stored.version();
                if incoming == current {
                    // Same change delivered again.
                    trace!(node = %change.node_id(), db_version = change.db_version(), "duplicate change");
                    Ok(Outcome::Superseded)
                } else if incoming > current {
                    // An honest node advances col_version and db_version
                    // together for a given cell; a change that claims a newer
                    // col_version without a newer db_version is a replayed or
                    // misbehaving lineage.
                    if change.node_id() == stored.node_id
                        && change.db_version() <= stored.db_version
                    {
                        warn!(
                            node = %change.node_id(),
                            stored_db_version = stored.db_version,
                            incoming_db_version = change.db_version(),
                            "discarding change with regressed clock"
                        );
                        return Err(MergeError::ClockRegression {
                            node_id: change.node_id(),
                            stored_db_version: stored.db_version,
                            incoming_db_version: change.db_version(),
                        }
                        .into());
                    }
                    self.commit(change, origin)?;
                    Ok(Outcome::Applied)
                } else {
                    trace!(node = %change.node_id(), db_version = change.db_version(), "change superseded by stored winner");
                    Ok(Outcome::Superseded)
                }
            }
        }
    }

    /// Mint versions for and apply a local mutation, under the same record
    /// lock so two local writers cannot race for the same `col_version`.
    ///
    /// A freshly minted version always wins its cell, so this skips the
    /// comparison and commits directly.
    pub fn write_local(&self, node_id: NodeId, record_id: K, op: Op<V>) -> Result<Change<K, V>> {
        let _guard = self
            .stripe(&record_id)
            .lock()
            .map_err(|_| MergeError::EngineUnavailable)?;

        let col_version = match op.column() {
            Some(column) => self.table.next_col_version(&record_id, column)?,
            None => self.table.next_record_version(&record_id)?,
        };
        let db_version = self.clock.tick();
        let change = Change::new(record_id, op, col_version, db_version, node_id);
        self.commit(&change, Origin::Local)?;
        Ok(change)
    }

    fn commit(&self, change: &Change<K, V>, origin: Origin) -> Result<()> {
        let state = match change.op() {
            Op::Put { value, .. } => CellState::Live(value.clone()),
            Op::DeleteColumn { .. } | Op::DeleteRecord => CellState::Tombstone,
        };
        self.table.set(
            change.cell_key(),
            StoredCell {
                col_version: change.col_version(),
                db_version: change.db_version(),
                node_id: change.node_id(),
                state,
            },
        )?;
        let local_db_version = self
            .log
            .append(change.clone(), origin == Origin::Local)?;
        debug!(
            node = %change.node_id(),
            db_version = change.db_version(),
            col_version = change.col_version(),
            local_db_version,
            record_level = change.is_record_level(),
            "change applied"
        );
        Ok(())
    }
}
