//! Core change types for the merge-and-sync core.
//!
//! A [`Change`] is the atomic unit of mutation and of synchronization: every
//! local write produces one, every sync session ships and receives them, and
//! the merge engine decides a winner per `(record, column)` cell by comparing
//! their `(col_version, db_version, node_id)` triples.
//!
//! The tombstone/value space is encoded as the closed [`Op`] enum rather than
//! a pair of independent optionals, so the invalid wire combination
//! (`col_name = none` with a value) is unrepresentable once decoded. The wire
//! form, [`WireChange`], keeps the optional encoding for interoperability and
//! validates on conversion.

use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::Result;

pub mod errors;

pub use errors::ChangeError;

/// Marker trait for record primary keys.
///
/// Any application-defined key type works as long as it supports equality,
/// hashing, and cheap cloning. Keys must never be reused across distinct
/// logical entities.
pub trait RecordId: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}
impl<T> RecordId for T where T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// Marker trait for column values.
pub trait Value: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}
impl<T> Value for T where T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

/// Stable identifier of a participating node.
///
/// Assigned at node provisioning and immutable for the node's lifetime.
/// Because no two nodes share an id, it makes the merge comparison total:
/// it is the final tie-break after `col_version` and `db_version`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        NodeId(id)
    }
}

/// Name of a record field.
pub type ColumnKey = String;

/// The mutation a [`Change`] carries.
///
/// Record *creation* is implicit in the first column write, so it has no
/// variant here; the wire encoding that would represent it
/// (`col_name = none`, `value = some`) is rejected during decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op<V> {
    /// Set a column to a value.
    Put { column: ColumnKey, value: V },
    /// Delete a single column (column tombstone).
    DeleteColumn { column: ColumnKey },
    /// Delete the whole record (record-level tombstone).
    DeleteRecord,
}

impl<V> Op<V> {
    /// The column this operation targets, or `None` for record-level ops.
    pub fn column(&self) -> Option<&ColumnKey> {
        match self {
            Op::Put { column, .. } | Op::DeleteColumn { column } => Some(column),
            Op::DeleteRecord => None,
        }
    }

    /// Whether this operation targets record existence rather than a field.
    pub fn is_record_level(&self) -> bool {
        matches!(self, Op::DeleteRecord)
    }
}

/// Addresses one cell of the version table: a `(record, column)` pair,
/// where `column: None` is the record-level slot (creation/tombstone state).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellKey<K> {
    pub record_id: K,
    pub column: Option<ColumnKey>,
}

impl<K> CellKey<K> {
    /// Key for a column cell.
    pub fn column(record_id: K, column: impl Into<ColumnKey>) -> Self {
        Self {
            record_id,
            column: Some(column.into()),
        }
    }

    /// Key for the record-level slot.
    pub fn record(record_id: K) -> Self {
        Self {
            record_id,
            column: None,
        }
    }
}

/// Process-independent identity of a change.
///
/// `db_version` is strictly increasing per node and never reused, so the
/// pair is unique across the whole deployment. Used to key the ephemeral
/// flag side-table without mutating the change itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeId {
    pub node_id: NodeId,
    pub db_version: u64,
}

/// A single replicated mutation.
///
/// Immutable once constructed: a change is never edited, only superseded by
/// a later change with a higher version triple. Receiving-side bookkeeping
/// (`local_db_version`) and ephemeral flags deliberately live elsewhere
/// (see [`crate::log`]), keeping this struct exactly what goes on the wire.
///
/// Serialization round-trips through [`WireChange`], so any decoded `Change`
/// has already passed tombstone/value validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    into = "WireChange<K, V>",
    try_from = "WireChange<K, V>",
    bound(
        serialize = "K: Clone + Serialize, V: Clone + Serialize",
        deserialize = "K: Clone + Deserialize<'de>, V: Clone + Deserialize<'de>"
    )
)]
pub struct Change<K, V> {
    record_id: K,
    op: Op<V>,
    col_version: u64,
    db_version: u64,
    node_id: NodeId,
}

impl<K, V> Change<K, V>
where
    K: RecordId,
    V: Value,
{
    /// Construct a change. Callers are expected to mint `col_version` and
    /// `db_version` through the version table and logical clock; see
    /// [`crate::Replica::write`].
    pub fn new(record_id: K, op: Op<V>, col_version: u64, db_version: u64, node_id: NodeId) -> Self {
        Self {
            record_id,
            op,
            col_version,
            db_version,
            node_id,
        }
    }

    /// The record this change targets.
    pub fn record_id(&self) -> &K {
        &self.record_id
    }

    /// The mutation carried by this change.
    pub fn op(&self) -> &Op<V> {
        &self.op
    }

    /// Per-column version counter, scoped to the originating node's view at
    /// write time. Primary conflict-resolution signal.
    pub fn col_version(&self) -> u64 {
        self.col_version
    }

    /// The writer's logical-clock value at creation time.
    pub fn db_version(&self) -> u64 {
        self.db_version
    }

    /// The node that created this change.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// The column this change targets, or `None` for record-level changes.
    pub fn column(&self) -> Option<&ColumnKey> {
        self.op.column()
    }

    /// Whether this change targets record existence rather than a field.
    pub fn is_record_level(&self) -> bool {
        self.op.is_record_level()
    }

    /// Deployment-wide identity of this change.
    pub fn id(&self) -> ChangeId {
        ChangeId {
            node_id: self.node_id,
            db_version: self.db_version,
        }
    }

    /// The version-table cell this change competes for.
    pub fn cell_key(&self) -> CellKey<K> {
        CellKey {
            record_id: self.record_id.clone(),
            column: self.op.column().cloned(),
        }
    }

    /// The lexicographic comparison key from the merge rules: higher
    /// `col_version` wins, then higher `db_version`, then higher `node_id`.
    pub fn version(&self) -> (u64, u64, NodeId) {
        (self.col_version, self.db_version, self.node_id)
    }
}

/// Transport encoding of a [`Change`].
///
/// Carries exactly the replicated fields: `record_id`, `col_name`, `value`,
/// `col_version`, `db_version`, `node_id`. The receiving node's
/// `local_db_version` and the ephemeral flags are process-local and never
/// serialized.
///
/// Field semantics follow the optional encoding: `col_name = None` means the
/// change targets record existence, `value = None` means deletion. The one
/// combination with no meaning (`col_name = None`, `value = Some`) fails
/// conversion with [`ChangeError::RecordLevelValue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireChange<K, V> {
    pub record_id: K,
    pub col_name: Option<ColumnKey>,
    pub value: Option<V>,
    pub col_version: u64,
    pub db_version: u64,
    pub node_id: NodeId,
}

impl<K, V> From<Change<K, V>> for WireChange<K, V> {
    fn from(change: Change<K, V>) -> Self {
        let (col_name, value) = match change.op {
            Op::Put { column, value } => (Some(column), Some(value)),
            Op::DeleteColumn { column } => (Some(column), None),
            Op::DeleteRecord => (None, None),
        };
        Self {
            record_id: change.record_id,
            col_name,
            value,
            col_version: change.col_version,
            db_version: change.db_version,
            node_id: change.node_id,
        }
    }
}

impl<K, V> TryFrom<WireChange<K, V>> for Change<K, V> {
    type Error = ChangeError;

    fn try_from(wire: WireChange<K, V>) -> std::result::Result<Self, ChangeError> {
        let op = match (wire.col_name, wire.value) {
            (Some(column), Some(value)) => Op::Put { column, value },
            (Some(column), None) => Op::DeleteColumn { column },
            (None, None) => Op::DeleteRecord,
            (None, Some(_)) => {
                return Err(ChangeError::RecordLevelValue {
                    node_id: wire.node_id,
                    db_version: wire.db_version,
                });
            }
        };
        Ok(Self {
            record_id: wire.record_id,
            op,
            col_version: wire.col_version,
            db_version: wire.db_version,
            node_id: wire.node_id,
        })
    }
}

impl<K, V> WireChange<K, V>
where
    K: RecordId,
    V: Value,
{
    /// Validate and decode into a [`Change`].
    pub fn into_change(self) -> Result<Change<K, V>> {
        Ok(Change::try_from(self)?)
    }
}
