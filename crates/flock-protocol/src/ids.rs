/// Cluster-unique ID generation without coordination.
///
/// The `i64` range is split evenly between the `N` cluster nodes; node
/// `i` counts upward from `floor(i64::MAX * i / N)`. Ranges are about
/// 2^63 / N wide, so overlap would take longer than any test run.
use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::ProtocolError;
use crate::types::NodeId;

#[derive(Debug)]
pub struct IdGenerator {
    start: i64,
    next: AtomicI64,
}

impl IdGenerator {
    /// Generator for node `index` of a `count`-node cluster.
    pub fn new(index: usize, count: usize) -> Result<Self, ProtocolError> {
        if count == 0 {
            return Err(ProtocolError::Config("cluster has no nodes".into()));
        }
        if index >= count {
            return Err(ProtocolError::Config(format!(
                "node index {index} out of range for {count} nodes"
            )));
        }

        let start = (i64::MAX as u128 * index as u128 / count as u128) as i64;
        Ok(Self {
            start,
            next: AtomicI64::new(start),
        })
    }

    /// Generator for `node`, positioned by its place in `node_ids`.
    pub fn for_node(node: &NodeId, node_ids: &[NodeId]) -> Result<Self, ProtocolError> {
        let index = node_ids
            .iter()
            .position(|id| id == node)
            .ok_or_else(|| ProtocolError::Config(format!("{node} is not in the cluster")))?;
        Self::new(index, node_ids.len())
    }

    /// Next ID. Strictly increasing per generator, safe to call concurrently.
    pub fn next(&self) -> i64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    pub fn start(&self) -> i64 {
        self.start
    }
}
