/// Gossip neighbors for this node.
///
/// Holds only this node's row of the cluster topology. Each update
/// replaces the row wholesale; readers always get a complete copy of
/// either the old or the new list.
use std::sync::{Arc, RwLock};

use crate::types::{NodeId, TopologyMap};

#[derive(Debug)]
pub struct TopologyManager {
    neighbors: RwLock<Arc<[NodeId]>>,
}

impl TopologyManager {
    /// Starts with no neighbors: nothing is gossiped until the first update.
    pub fn new() -> Self {
        Self {
            neighbors: RwLock::new(Arc::from(Vec::new())),
        }
    }

    /// Atomically replace the neighbor list.
    pub fn set_neighbors(&self, neighbors: Vec<NodeId>) {
        let row: Arc<[NodeId]> = neighbors.into();
        *self.neighbors.write().unwrap_or_else(|e| e.into_inner()) = row;
    }

    /// Copy of the current neighbor list.
    pub fn neighbors(&self) -> Vec<NodeId> {
        self.current().to_vec()
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }

    fn current(&self) -> Arc<[NodeId]> {
        self.neighbors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for TopologyManager {
    fn default() -> Self {
        Self::new()
    }
}

/// This node's row of `topology`, without self-loops or duplicates.
///
/// `None` if the map has no row for `local`.
pub fn row_for(topology: &TopologyMap, local: &NodeId) -> Option<Vec<NodeId>> {
    let row = topology.get(local)?;
    let mut neighbors: Vec<NodeId> = Vec::with_capacity(row.len());
    for node in row {
        if node != local && !neighbors.contains(node) {
            neighbors.push(node.clone());
        }
    }
    Some(neighbors)
}
