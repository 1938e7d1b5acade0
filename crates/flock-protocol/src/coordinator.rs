/// Gossip coordinator: bridges inbound requests to the store, the
/// topology and the dispatcher.
///
/// Holds no state of its own. Every component it touches is shared
/// behind an `Arc` or a cloneable handle, so the coordinator itself is
/// cheap to clone into per-request handler tasks.
use std::sync::Arc;

use crate::dispatcher::DispatchHandle;
use crate::error::ProtocolError;
use crate::store::MessageStore;
use crate::topology::{row_for, TopologyManager};
use crate::types::{NodeId, TopologyMap, Value};

#[derive(Clone)]
pub struct GossipCoordinator {
    local: NodeId,
    store: Arc<MessageStore>,
    topology: Arc<TopologyManager>,
    dispatcher: DispatchHandle,
}

impl GossipCoordinator {
    pub fn new(
        local: NodeId,
        store: Arc<MessageStore>,
        topology: Arc<TopologyManager>,
        dispatcher: DispatchHandle,
    ) -> Self {
        Self {
            local,
            store,
            topology,
            dispatcher,
        }
    }

    pub fn local(&self) -> &NodeId {
        &self.local
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn topology(&self) -> &TopologyManager {
        &self.topology
    }

    pub fn dispatcher(&self) -> &DispatchHandle {
        &self.dispatcher
    }

    /// Record `value`. If it is new, queue one delivery per neighbor as
    /// of right now. Returns whether the value was new.
    ///
    /// The caller acknowledges the sender either way.
    pub fn on_broadcast(&self, value: Value) -> bool {
        if !self.store.try_insert(value) {
            tracing::trace!(value, "already known");
            return false;
        }

        let neighbors = self.topology.neighbors();
        let queued = self.dispatcher.enqueue_all(value, neighbors);
        tracing::debug!(value, fan_out = queued, "new value");
        true
    }

    /// Every value observed so far.
    pub fn on_read(&self) -> Vec<Value> {
        self.store.snapshot()
    }

    /// Adopt this node's row of `topology` as the neighbor list.
    ///
    /// A map without a row for this node is rejected and the current
    /// neighbors are kept.
    pub fn on_topology(&self, topology: &TopologyMap) -> Result<(), ProtocolError> {
        let neighbors =
            row_for(topology, &self.local).ok_or_else(|| ProtocolError::MalformedRequest {
                kind: "topology".into(),
                reason: format!("no entry for {}", self.local),
            })?;

        tracing::info!(neighbors = ?neighbors, "topology updated");
        self.topology.set_neighbors(neighbors);
        Ok(())
    }
}
