//! Change log diff production: completeness, ordering, cursor semantics.

use crate::helpers::*;

#[test]
fn changes_since_returns_exactly_the_missing_suffix() {
    let replica = replica(1);
    let mut cursors = Vec::new();
    for i in 0..10u64 {
        replica.put(i, "value", format!("v{i}")).unwrap();
        cursors.push(replica.last_local_version().unwrap());
    }

    // From zero: everything, ascending, no gaps or duplicates.
    let all = replica.changes_since(0).unwrap();
    assert_eq!(all.len(), 10);
    for pair in all.windows(2) {
        assert!(pair[0].local_db_version < pair[1].local_db_version);
    }

    // From each cursor: exactly the entries strictly after it.
    for (i, &cursor) in cursors.iter().enumerate() {
        let diff = replica.changes_since(cursor).unwrap();
        assert_eq!(diff.len(), 9 - i);
        assert!(diff.iter().all(|entry| entry.local_db_version > cursor));
    }
}

#[test]
fn remote_applies_are_sequenced_into_the_diff() {
    let replica = replica(1);
    replica.put(1, "a", "local".to_string()).unwrap();
    let cursor = replica.last_local_version().unwrap();

    replica
        .apply_wire(wire_put(2, "b", "remote", 1, 10, 9))
        .unwrap();

    // The remote change shows up after the cursor, so a third peer pulling
    // from this node receives it too.
    let diff = replica.changes_since(cursor).unwrap();
    assert_eq!(diff.len(), 1);
    assert_eq!(diff[0].change.node_id(), concord::NodeId(9));
}

#[test]
fn superseded_changes_never_enter_the_log() {
    let replica = replica(1);
    replica
        .apply_wire(wire_put(1, "a", "winner", 2, 20, 2))
        .unwrap();
    replica
        .apply_wire(wire_put(1, "a", "loser", 1, 30, 3))
        .unwrap();

    let all = replica.changes_since(0).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].change.node_id(), concord::NodeId(2));
}

#[test]
fn superseded_history_stays_in_the_log() {
    // An old winner stays in the log after being superseded, so a peer that
    // has not caught up still sees the full dominance history.
    let replica = replica(1);
    replica
        .apply_wire(wire_put(1, "a", "first", 1, 10, 2))
        .unwrap();
    replica
        .apply_wire(wire_put(1, "a", "second", 2, 11, 2))
        .unwrap();

    let all = replica.changes_since(0).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].change.col_version(), 1);
    assert_eq!(all[1].change.col_version(), 2);
}

#[test]
fn rerunning_a_cursor_is_idempotent_for_the_requester() {
    let replica = replica(1);
    for i in 0..5u64 {
        replica.put(i, "v", i.to_string()).unwrap();
    }
    let cursor = replica.changes_since(0).unwrap()[2].local_db_version;

    let first = replica.changes_since(cursor).unwrap();
    let second = replica.changes_since(cursor).unwrap();
    assert_eq!(first, second);
}

#[test]
fn flags_track_origin_and_broadcast() {
    let replica = replica(1);
    let local = replica.put(1, "a", "x".to_string()).unwrap();
    replica
        .apply_wire(wire_put(2, "a", "y", 1, 10, 9))
        .unwrap();
    let remote_id = replica.changes_since(0).unwrap()[1].change.id();

    let log = replica.log();
    assert!(log.is_locally_originated(local.id()).unwrap());
    assert!(!log.is_locally_originated(remote_id).unwrap());

    assert!(!log.is_broadcast(local.id()).unwrap());
    log.mark_broadcast(&[local.id()]).unwrap();
    assert!(log.is_broadcast(local.id()).unwrap());
}
