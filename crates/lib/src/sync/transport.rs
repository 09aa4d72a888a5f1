//! Transport abstraction for exchanging wire changes between peers.
//!
//! The merge core never performs I/O; everything network-shaped goes through
//! the [`Transport`] trait so deployments can plug in whatever framing and
//! transport stack they already run. The in-process [`MemoryNetwork`] backs
//! tests and single-process simulations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::Result;
use crate::change::{NodeId, RecordId, Value, WireChange};

/// Opaque change transport between this node and its peers.
///
/// Implementations own framing, retries, and timeouts; a failure surfaces as
/// [`SyncError::Network`] and leaves the session retryable.
#[async_trait]
pub trait Transport<K, V>: Send + Sync
where
    K: RecordId,
    V: Value,
{
    /// Deliver a batch of changes to `peer`, in order.
    async fn send(&self, peer: NodeId, changes: Vec<WireChange<K, V>>) -> Result<()>;

    /// Collect the changes `peer` has queued for this node since the last
    /// call. Returns an empty batch when there is nothing pending.
    async fn receive(&self, peer: NodeId) -> Result<Vec<WireChange<K, V>>>;
}

/// In-process hub routing change batches between registered peers.
///
/// One mailbox per directed `(to, from)` pair; [`MemoryTransport::receive`]
/// drains the mailbox. Delivery is reliable and ordered, which is the
/// *easiest* case the merge core must handle — tests shuffle and duplicate
/// batches on top of this to exercise the hard ones.
pub struct MemoryNetwork<K, V> {
    mailboxes: Mutex<HashMap<(NodeId, NodeId), Vec<WireChange<K, V>>>>,
}

impl<K, V> MemoryNetwork<K, V>
where
    K: RecordId,
    V: Value,
{
    /// Create an empty network hub.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            mailboxes: Mutex::new(HashMap::new()),
        })
    }

    /// Create a transport endpoint for `node` attached to this hub.
    pub fn endpoint(self: &Arc<Self>, node: NodeId) -> MemoryTransport<K, V> {
        MemoryTransport {
            network: self.clone(),
            local: node,
        }
    }
}

/// One node's endpoint on a [`MemoryNetwork`].
pub struct MemoryTransport<K, V> {
    network: Arc<MemoryNetwork<K, V>>,
    local: NodeId,
}

#[async_trait]
impl<K, V> Transport<K, V> for MemoryTransport<K, V>
where
    K: RecordId,
    V: Value,
{
    async fn send(&self, peer: NodeId, changes: Vec<WireChange<K, V>>) -> Result<()> {
        let mut mailboxes = self.network.mailboxes.lock().await;
        mailboxes
            .entry((peer, self.local))
            .or_default()
            .extend(changes);
        Ok(())
    }

    async fn receive(&self, peer: NodeId) -> Result<Vec<WireChange<K, V>>> {
        let mut mailboxes = self.network.mailboxes.lock().await;
        Ok(mailboxes
            .remove(&(self.local, peer))
            .unwrap_or_default())
    }
}
