//! Multi-node convergence under reordering, duplication, and interleaving.
//!
//! These are the properties everything else rests on: applying the same set
//! of changes in any order, any number of times, yields the same state on
//! every node.

use crate::helpers::*;
use std::sync::Arc;

/// Collect every change a replica has ever applied as wire changes.
fn full_history(replica: &Arc<TestReplica>) -> Vec<TestWire> {
    replica
        .changes_since(0)
        .unwrap()
        .into_iter()
        .map(|entry| entry.change.into())
        .collect()
}

/// Assert two replicas agree on a set of (record, column) reads.
fn assert_same_state(a: &Arc<TestReplica>, b: &Arc<TestReplica>, cells: &[(u64, &str)]) {
    for (record, column) in cells {
        assert_eq!(
            a.get(record, *column).unwrap(),
            b.get(record, *column).unwrap(),
            "divergence at record {record} column {column}"
        );
        assert_eq!(
            a.is_record_deleted(record).unwrap(),
            b.is_record_deleted(record).unwrap(),
            "liveness divergence at record {record}"
        );
    }
}

#[test]
fn two_nodes_converge_after_cross_delivery() {
    let a = replica(1);
    let b = replica(2);

    a.put(42, "name", "Alice".to_string()).unwrap();
    a.put(42, "email", "alice@example.com".to_string()).unwrap();
    b.put(42, "name", "Bob".to_string()).unwrap();
    b.delete_record(43).unwrap();

    for wire in full_history(&a) {
        let _ = b.apply_wire(wire).unwrap();
    }
    for wire in full_history(&b) {
        let _ = a.apply_wire(wire).unwrap();
    }

    assert_same_state(&a, &b, &[(42, "name"), (42, "email"), (43, "x")]);
}

#[test]
fn all_permutations_of_conflicting_changes_converge() {
    // Three conflicting writes to the same cell; all six application orders
    // must produce the same winner.
    let changes = [
        wire_put(1, "v", "from-node-1", 1, 10, 1),
        wire_put(1, "v", "from-node-2", 1, 11, 2),
        wire_put(1, "v", "from-node-3", 2, 5, 3),
    ];
    let orders: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    let mut winners = Vec::new();
    for order in orders {
        let replica = replica(9);
        for index in order {
            let _ = replica.apply_wire(changes[index].clone()).unwrap();
        }
        winners.push(replica.get(&1, "v").unwrap());
    }
    // col_version 2 dominates both col_version-1 writes.
    assert!(winners.iter().all(|w| w.as_deref() == Some("from-node-3")));
}

#[test]
fn three_node_mesh_converges_under_shuffled_delivery() {
    let nodes = [replica(1), replica(2), replica(3)];

    // Independent offline edits, overlapping records and columns.
    nodes[0].put(1, "title", "draft".to_string()).unwrap();
    nodes[0].put(2, "owner", "ada".to_string()).unwrap();
    nodes[1].put(1, "title", "review".to_string()).unwrap();
    nodes[1].put(1, "status", "open".to_string()).unwrap();
    nodes[2].delete_record(2).unwrap();
    nodes[2].put(3, "tag", "urgent".to_string()).unwrap();

    // Everyone eventually receives everyone's changes, in a different
    // shuffled order per receiver, with one duplicated delivery pass.
    let all_changes: Vec<TestWire> = nodes.iter().flat_map(full_history).collect();
    for (seed, node) in nodes.iter().enumerate() {
        let mut batch = all_changes.clone();
        shuffle(&mut batch, seed as u64 + 7);
        for wire in batch.iter().chain(batch.iter()) {
            let _ = node.apply_wire(wire.clone()).unwrap();
        }
    }

    let cells = [
        (1, "title"),
        (1, "status"),
        (2, "owner"),
        (3, "tag"),
    ];
    assert_same_state(&nodes[0], &nodes[1], &cells);
    assert_same_state(&nodes[1], &nodes[2], &cells);

    // Record 2: node 3's delete was minted without having seen node 1's
    // write, so the write's col_version ties the tombstone's. The column
    // survives the tie, so the record reads as live on every node.
    assert!(!nodes[0].is_record_deleted(&2).unwrap());
    assert!(!nodes[2].is_record_deleted(&2).unwrap());
    assert_eq!(nodes[2].get(&2, "owner").unwrap().as_deref(), Some("ada"));
}

#[test]
fn reapplying_full_history_is_a_no_op() {
    let a = replica(1);
    a.put(1, "x", "1".to_string()).unwrap();
    a.delete_column(1, "x").unwrap();
    a.put(1, "y", "2".to_string()).unwrap();
    a.delete_record(5).unwrap();

    let before: Vec<_> = a.changes_since(0).unwrap();
    for wire in full_history(&a) {
        let outcome = a.apply_wire(wire).unwrap();
        assert_eq!(outcome, concord::Outcome::Superseded);
    }
    assert_eq!(a.changes_since(0).unwrap(), before);
}

#[test]
fn concurrent_writers_on_one_replica_converge_with_a_peer() {
    // Many threads writing distinct records while another applies remote
    // changes; the final exchange must still converge.
    let a = replica(1);
    let mut handles = Vec::new();
    for t in 0..4u64 {
        let a = a.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..50u64 {
                let record = t * 100 + i;
                a.put(record, "v", format!("{t}-{i}")).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let b = replica(2);
    for wire in full_history(&a) {
        let _ = b.apply_wire(wire).unwrap();
    }
    for t in 0..4u64 {
        for i in 0..50u64 {
            let record = t * 100 + i;
            assert_eq!(
                b.get(&record, "v").unwrap(),
                a.get(&record, "v").unwrap()
            );
        }
    }
}
