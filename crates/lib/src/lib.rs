//!
//! Concord: the conflict-resolution and synchronization core of a
//! CRDT-backed structured store.
//!
//! Independent nodes mutate the same logical records and columns offline,
//! exchange change records, and converge to an identical state without
//! coordination. This crate is the merge-and-sync core only: deciding, for
//! every `(record, column)` pair, which of two conflicting writes wins, how
//! deletions interact with later writes, and how a node computes the set of
//! changes another node is missing. Storage, query execution, and transport
//! are external collaborators behind traits.
//!
//! ## Core Concepts
//!
//! * **Changes ([`Change`])**: The atomic unit of mutation and of
//!   synchronization; immutable once recorded.
//! * **Logical Clock ([`LogicalClock`])**: Lamport-style counter producing
//!   the per-node `db_version` order.
//! * **Version Table ([`table::VersionTable`])**: Per-record, per-column
//!   current-winner cache over a pluggable [`backend::Storage`].
//! * **Merge Engine ([`merge::MergeEngine`])**: Applies changes with the
//!   deterministic `(col_version, db_version, node_id)` comparison;
//!   commutative, associative, and idempotent.
//! * **Change Log ([`log::ChangeLog`])**: Append-only history indexed by
//!   `local_db_version`, answering `changes_since(cursor)` diffs.
//! * **Replica ([`Replica`])**: Per-node facade exposing `write`,
//!   `apply_remote`, and `changes_since`.
//! * **Sync Coordinator ([`sync::SyncCoordinator`])**: The only
//!   I/O-touching piece; exchanges diffs with peers over a
//!   [`sync::Transport`].

pub mod backend;
pub mod change;
pub mod clock;
pub mod log;
pub mod merge;
pub mod replica;
pub mod sync;
pub mod table;

pub use backend::{CellState, InMemory, Storage, StoredCell};
pub use change::{
    CellKey, Change, ChangeId, ColumnKey, NodeId, Op, RecordId, Value, WireChange,
};
pub use clock::LogicalClock;
pub use log::{ChangeFlags, ChangeLog, SequencedChange};
pub use merge::{MergeEngine, Origin, Outcome};
pub use replica::Replica;
pub use sync::{SyncCoordinator, Transport};
pub use table::VersionTable;

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured change validation errors from the change module
    #[error(transparent)]
    Change(#[from] change::ChangeError),

    /// Structured storage errors from the backend module
    #[error(transparent)]
    Storage(#[from] backend::StorageError),

    /// Structured merge errors from the merge module
    #[error(transparent)]
    Merge(#[from] merge::MergeError),

    /// Structured synchronization errors from the sync module
    #[error(transparent)]
    Sync(#[from] sync::SyncError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
            Error::Change(_) => "change",
            Error::Storage(_) => "backend",
            Error::Merge(_) => "merge",
            Error::Sync(_) => "sync",
        }
    }

    /// Check if this error marks a malformed change that failed validation.
    pub fn is_invalid_change(&self) -> bool {
        match self {
            Error::Change(err) => err.is_invalid_change(),
            _ => false,
        }
    }

    /// Check if this error flags a replayed or misbehaving peer clock.
    pub fn is_clock_regression(&self) -> bool {
        match self {
            Error::Merge(err) => err.is_clock_regression(),
            _ => false,
        }
    }

    /// Check if this error is a retryable storage outage.
    pub fn is_storage_unavailable(&self) -> bool {
        match self {
            Error::Storage(err) => err.is_unavailable(),
            _ => false,
        }
    }

    /// Check if this error is a network/transport failure.
    pub fn is_network_error(&self) -> bool {
        match self {
            Error::Sync(err) => err.is_network_error(),
            _ => false,
        }
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}
