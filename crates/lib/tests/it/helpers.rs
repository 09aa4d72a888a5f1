//! Shared test helpers: replica factories and change builders.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use concord::{NodeId, Replica, WireChange};

/// Records are keyed by u64 and hold string column values in these tests.
pub type TestReplica = Replica<u64, String>;
pub type TestWire = WireChange<u64, String>;

/// Create a fresh in-memory replica for the given node id.
pub fn replica(node: u64) -> Arc<TestReplica> {
    Arc::new(TestReplica::in_memory(NodeId(node)).expect("replica should open"))
}

/// Build a wire-encoded column write, as a peer would transmit it.
pub fn wire_put(
    record: u64,
    column: &str,
    value: &str,
    col_version: u64,
    db_version: u64,
    node: u64,
) -> TestWire {
    WireChange {
        record_id: record,
        col_name: Some(column.to_string()),
        value: Some(value.to_string()),
        col_version,
        db_version,
        node_id: NodeId(node),
    }
}

/// Build a wire-encoded column deletion.
pub fn wire_delete_column(
    record: u64,
    column: &str,
    col_version: u64,
    db_version: u64,
    node: u64,
) -> TestWire {
    WireChange {
        record_id: record,
        col_name: Some(column.to_string()),
        value: None,
        col_version,
        db_version,
        node_id: NodeId(node),
    }
}

/// Build a wire-encoded record tombstone.
pub fn wire_delete_record(record: u64, col_version: u64, db_version: u64, node: u64) -> TestWire {
    WireChange {
        record_id: record,
        col_name: None,
        value: None,
        col_version,
        db_version,
        node_id: NodeId(node),
    }
}

/// Deterministic shuffle for reordering tests; a fixed seed keeps runs
/// reproducible.
pub fn shuffle<T>(items: &mut [T], seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);
}
