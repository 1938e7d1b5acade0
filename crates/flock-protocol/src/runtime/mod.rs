/// Protocol runtime: wires the gossip components to a live node.
///
/// The runtime owns one instance of each component (store, topology,
/// dispatcher, ID generator), built once at startup and handed to every
/// request handler. Nothing is global.
mod r#loop;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use flock_transport::{Node, NodeHandle};

use crate::coordinator::GossipCoordinator;
use crate::dispatcher::{BroadcastDispatcher, DispatchStats, DispatcherConfig};
use crate::error::ProtocolError;
use crate::ids::IdGenerator;
use crate::store::MessageStore;
use crate::topology::TopologyManager;

// ── Configuration ─────────────────────────────────────────────────────

/// Configuration for the protocol runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Dispatcher workers (concurrent outbound sends).
    pub workers: usize,
    /// Deadline for one gossip delivery attempt.
    pub send_timeout: Duration,
    /// Delay before retrying a failed delivery.
    pub retry_backoff: Duration,
    /// Random extra delay, up to this much, on top of `retry_backoff`.
    pub retry_jitter: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let dispatcher = DispatcherConfig::default();
        Self {
            workers: dispatcher.workers,
            send_timeout: dispatcher.send_timeout,
            retry_backoff: dispatcher.retry_backoff,
            retry_jitter: dispatcher.retry_jitter,
        }
    }
}

impl RuntimeConfig {
    fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            workers: self.workers,
            send_timeout: self.send_timeout,
            retry_backoff: self.retry_backoff,
            retry_jitter: self.retry_jitter,
        }
    }
}

// ── Runtime ───────────────────────────────────────────────────────────

/// Shared by every request handler.
#[derive(Clone)]
pub(crate) struct Context {
    pub handle: NodeHandle,
    pub coordinator: GossipCoordinator,
    pub ids: Arc<IdGenerator>,
}

pub struct Runtime {
    context: Context,
    dispatcher: BroadcastDispatcher,
}

impl Runtime {
    /// Build the components for the node behind `handle` and start the
    /// dispatcher. Outbound gossip goes through `handle` as well.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(handle: NodeHandle, config: RuntimeConfig) -> Result<Self, ProtocolError> {
        let ids = IdGenerator::for_node(handle.id(), handle.node_ids())?;
        tracing::debug!(start = ids.start(), "id range assigned");
        let dispatcher = BroadcastDispatcher::spawn(Arc::new(handle.clone()), config.dispatcher())?;

        let coordinator = GossipCoordinator::new(
            handle.id().clone(),
            Arc::new(MessageStore::new()),
            Arc::new(TopologyManager::new()),
            dispatcher.handle(),
        );

        Ok(Self {
            context: Context {
                handle,
                coordinator,
                ids: Arc::new(ids),
            },
            dispatcher,
        })
    }

    pub fn coordinator(&self) -> &GossipCoordinator {
        &self.context.coordinator
    }

    pub fn stats(&self) -> &DispatchStats {
        self.dispatcher.stats()
    }

    /// Serve requests from `node` until its input ends, then stop the
    /// dispatcher. Undelivered gossip is dropped.
    pub async fn run(self, node: Node) -> Result<(), ProtocolError> {
        let result = r#loop::serve(node, self.context).await;

        let stats = self.dispatcher.stats();
        tracing::info!(
            enqueued = stats.enqueued.get(),
            retired = stats.retired.get(),
            failures = stats.failures.get(),
            "runtime stopped"
        );
        self.dispatcher.shutdown();
        result
    }
}
