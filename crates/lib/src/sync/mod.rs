//! Synchronization coordinator.
//!
//! The coordinator is the only piece of the system that touches I/O. It is a
//! thin adapter around the merge core: pull the diff a peer is missing from
//! the local log, hand it to the transport, and feed whatever the peer sent
//! back through `apply`. Its correctness rests entirely on the merge engine
//! being safe under arbitrary delivery order, duplication, and reordering —
//! the coordinator itself only tracks cursors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::Result;
use crate::backend::StorageError;
use crate::change::{ChangeId, NodeId, RecordId, Value, WireChange};
use crate::merge::Outcome;
use crate::replica::Replica;

pub mod error;
pub mod state;
pub mod transport;

pub use error::SyncError;
pub use state::{PeerState, SyncReport};
pub use transport::{MemoryNetwork, MemoryTransport, Transport};

/// Orchestrates change exchange between the local replica and its peers.
///
/// Per peer, the coordinator remembers the last `local_db_version`
/// successfully transmitted; a session sends everything after that cursor,
/// then drains and applies the peer's queued changes. A failed session
/// leaves the cursor unadvanced and is safe to retry.
pub struct SyncCoordinator<K, V> {
    replica: Arc<Replica<K, V>>,
    transport: Arc<dyn Transport<K, V>>,
    peers: Mutex<HashMap<NodeId, PeerState>>,
}

impl<K, V> SyncCoordinator<K, V>
where
    K: RecordId,
    V: Value,
{
    /// Create a coordinator for `replica` over the given transport.
    pub fn new(replica: Arc<Replica<K, V>>, transport: Arc<dyn Transport<K, V>>) -> Self {
        Self {
            replica,
            transport,
            peers: Mutex::new(HashMap::new()),
        }
    }

    fn peers(&self) -> Result<std::sync::MutexGuard<'_, HashMap<NodeId, PeerState>>> {
        self.peers.lock().map_err(|_| {
            StorageError::Unavailable {
                reason: "peer state lock poisoned".to_string(),
            }
            .into()
        })
    }

    /// Current sync state for a peer, if any session has been attempted.
    pub fn peer_state(&self, peer: NodeId) -> Result<Option<PeerState>> {
        Ok(self.peers()?.get(&peer).cloned())
    }

    /// Run one sync session with `peer`: send our diff, apply theirs.
    ///
    /// Individual inbound changes that fail validation or flag a clock
    /// regression are discarded with a warning and counted in the report;
    /// transport failures abort the session with the cursor unadvanced.
    pub async fn sync_with(&self, peer: NodeId) -> Result<SyncReport> {
        let cursor = {
            let mut peers = self.peers()?;
            peers.entry(peer).or_insert_with(|| PeerState::new(peer)).send_cursor
        };

        let mut report = SyncReport::new(peer);

        let outbound = self.replica.changes_since(cursor)?;
        let new_cursor = outbound
            .last()
            .map(|entry| entry.local_db_version)
            .unwrap_or(cursor);
        let sent_ids: Vec<ChangeId> = outbound.iter().map(|entry| entry.change.id()).collect();
        let batch: Vec<WireChange<K, V>> = outbound
            .into_iter()
            .map(|entry| entry.change.into())
            .collect();
        report.sent = batch.len();

        if let Err(err) = self.transport.send(peer, batch).await {
            self.record_failure(peer)?;
            warn!(%peer, error = %err, "sync send failed, cursor unadvanced");
            return Err(err);
        }
        self.replica.log().mark_broadcast(&sent_ids)?;

        let inbound = match self.transport.receive(peer).await {
            Ok(inbound) => inbound,
            Err(err) => {
                self.record_failure(peer)?;
                warn!(%peer, error = %err, "sync receive failed");
                return Err(err);
            }
        };

        let received = inbound.len() as u64;
        for wire in inbound {
            match self.replica.apply_wire(wire) {
                Ok(Outcome::Applied) => report.applied += 1,
                Ok(Outcome::Superseded) => report.superseded += 1,
                Ok(Outcome::Ignored) => report.ignored += 1,
                Err(err) if err.is_invalid_change() || err.is_clock_regression() => {
                    warn!(%peer, error = %err, "discarding inbound change");
                    report.discarded += 1;
                }
                Err(err) => {
                    self.record_failure(peer)?;
                    return Err(err);
                }
            }
        }

        {
            let mut peers = self.peers()?;
            let state = peers.entry(peer).or_insert_with(|| PeerState::new(peer));
            state.record_success(new_cursor, report.sent as u64, received);
        }
        info!(
            %peer,
            session = %report.session_id,
            sent = report.sent,
            applied = report.applied,
            superseded = report.superseded,
            ignored = report.ignored,
            discarded = report.discarded,
            "sync session complete"
        );
        Ok(report)
    }

    fn record_failure(&self, peer: NodeId) -> Result<()> {
        self.peers()?
            .entry(peer)
            .or_insert_with(|| PeerState::new(peer))
            .record_failure();
        Ok(())
    }
}
