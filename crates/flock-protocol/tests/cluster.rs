//! Integration tests: several in-process nodes wired together through a
//! simulated network with injectable partitions.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use flock_protocol::{
    BroadcastDispatcher, DispatcherConfig, GossipCoordinator, MessageStore, NodeId, ProtocolError,
    TopologyManager, TopologyMap, Transport, Value,
};
use flock_transport::TransportError;

// ── Simulated network ─────────────────────────────────────────────────

#[derive(Default)]
struct SimNetwork {
    nodes: RwLock<HashMap<NodeId, GossipCoordinator>>,
    /// Unordered pairs that cannot talk.
    cut: Mutex<HashSet<(NodeId, NodeId)>>,
    /// Remaining deliveries to drop per destination.
    drops: Mutex<HashMap<NodeId, usize>>,
    attempts: Mutex<HashMap<NodeId, usize>>,
}

impl SimNetwork {
    fn key(a: &NodeId, b: &NodeId) -> (NodeId, NodeId) {
        if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        }
    }

    fn partition(&self, a: &NodeId, b: &NodeId) {
        self.cut.lock().unwrap().insert(Self::key(a, b));
    }

    fn heal(&self) {
        self.cut.lock().unwrap().clear();
    }

    fn drop_next(&self, dst: &NodeId, n: usize) {
        self.drops.lock().unwrap().insert(dst.clone(), n);
    }

    fn attempts_to(&self, dst: &NodeId) -> usize {
        self.attempts.lock().unwrap().get(dst).copied().unwrap_or(0)
    }

    fn deliver(&self, from: &NodeId, to: &NodeId, value: Value) -> Result<(), ProtocolError> {
        *self.attempts.lock().unwrap().entry(to.clone()).or_default() += 1;

        let unreachable = || {
            ProtocolError::Transport(TransportError::Timeout {
                node_id: to.clone(),
            })
        };

        if self.cut.lock().unwrap().contains(&Self::key(from, to)) {
            return Err(unreachable());
        }
        if let Some(left) = self.drops.lock().unwrap().get_mut(to) {
            if *left > 0 {
                *left -= 1;
                return Err(unreachable());
            }
        }

        let nodes = self.nodes.read().unwrap();
        let target = nodes.get(to).ok_or_else(unreachable)?;
        target.on_broadcast(value);
        Ok(())
    }
}

/// One node's view of the network.
struct SimTransport {
    local: NodeId,
    net: Arc<SimNetwork>,
}

#[async_trait::async_trait]
impl Transport for SimTransport {
    async fn send_value(
        &self,
        target: &NodeId,
        value: Value,
        _timeout: Duration,
    ) -> Result<(), ProtocolError> {
        let result = self.net.deliver(&self.local, target, value);
        if result.is_err() {
            // Stand-in for a lost round trip.
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        result
    }
}

// ── Cluster harness ───────────────────────────────────────────────────

struct Cluster {
    net: Arc<SimNetwork>,
    ids: Vec<NodeId>,
    _dispatchers: Vec<BroadcastDispatcher>,
}

impl Cluster {
    fn new(size: usize) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("warn")
            .try_init();

        let net = Arc::new(SimNetwork::default());
        let ids: Vec<NodeId> = (0..size).map(|i| format!("n{i}").parse().unwrap()).collect();

        let mut dispatchers = Vec::new();
        for id in &ids {
            let transport = Arc::new(SimTransport {
                local: id.clone(),
                net: net.clone(),
            });
            let config = DispatcherConfig {
                workers: 4,
                ..Default::default()
            };
            let dispatcher = BroadcastDispatcher::spawn(transport, config).unwrap();
            let coordinator = GossipCoordinator::new(
                id.clone(),
                Arc::new(MessageStore::new()),
                Arc::new(TopologyManager::new()),
                dispatcher.handle(),
            );
            net.nodes.write().unwrap().insert(id.clone(), coordinator);
            dispatchers.push(dispatcher);
        }

        Self {
            net,
            ids,
            _dispatchers: dispatchers,
        }
    }

    fn id(&self, i: usize) -> &NodeId {
        &self.ids[i]
    }

    fn node(&self, i: usize) -> GossipCoordinator {
        self.net.nodes.read().unwrap()[&self.ids[i]].clone()
    }

    /// Send the same topology message to every node.
    fn set_topology(&self, topology: &TopologyMap) {
        for i in 0..self.ids.len() {
            self.node(i).on_topology(topology).unwrap();
        }
    }

    /// n0 - n1 - ... - n(k-1)
    fn line(&self) -> TopologyMap {
        let last = self.ids.len() - 1;
        (0..=last)
            .map(|i| {
                let mut row = Vec::new();
                if i > 0 {
                    row.push(self.ids[i - 1].clone());
                }
                if i < last {
                    row.push(self.ids[i + 1].clone());
                }
                (self.ids[i].clone(), row)
            })
            .collect()
    }

    fn ring(&self) -> TopologyMap {
        let k = self.ids.len();
        (0..k)
            .map(|i| {
                let row = vec![self.ids[(i + k - 1) % k].clone(), self.ids[(i + 1) % k].clone()];
                (self.ids[i].clone(), row)
            })
            .collect()
    }

    fn read(&self, i: usize) -> HashSet<Value> {
        self.node(i).on_read().into_iter().collect()
    }

    async fn wait_for(&self, i: usize, value: Value) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while !self.read(i).contains(&value) {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("{} never saw {value}", self.ids[i]));
    }

    async fn wait_converged(&self, expected: &HashSet<Value>) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while !(0..self.ids.len()).all(|i| &self.read(i) == expected) {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("cluster did not converge");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn line_topology_reaches_the_far_end() {
    let cluster = Cluster::new(5);
    cluster.set_topology(&cluster.line());

    assert!(cluster.node(0).on_broadcast(7));
    assert!(cluster.read(0).contains(&7));

    cluster.wait_for(4, 7).await;
    cluster.wait_converged(&HashSet::from([7])).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn values_from_every_node_converge() {
    let cluster = Cluster::new(6);
    cluster.set_topology(&cluster.ring());

    let mut expected = HashSet::new();
    for v in 0..60 {
        let origin = (v as usize * 7) % 6;
        cluster.node(origin).on_broadcast(v);
        expected.insert(v);
    }

    cluster.wait_converged(&expected).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn converges_after_partition_heals() {
    let cluster = Cluster::new(4);
    cluster.set_topology(&cluster.line());
    cluster.net.partition(cluster.id(1), cluster.id(2));

    cluster.node(0).on_broadcast(11);
    cluster.node(3).on_broadcast(22);
    cluster.wait_for(1, 11).await;
    cluster.wait_for(2, 22).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!cluster.read(3).contains(&11));
    assert!(!cluster.read(0).contains(&22));
    assert!(cluster.net.attempts_to(cluster.id(2)) > 1);

    cluster.net.heal();
    cluster.wait_converged(&HashSet::from([11, 22])).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn lost_deliveries_are_retried() {
    let cluster = Cluster::new(2);
    cluster.set_topology(&cluster.line());
    cluster.net.drop_next(cluster.id(1), 5);

    cluster.node(0).on_broadcast(3);
    cluster.wait_for(1, 3).await;

    assert!(cluster.net.attempts_to(cluster.id(1)) >= 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn gossip_echo_does_not_refan() {
    let cluster = Cluster::new(3);
    cluster.set_topology(&cluster.ring());

    cluster.node(0).on_broadcast(5);
    cluster.wait_converged(&HashSet::from([5])).await;

    // Let the echoes settle before counting.
    tokio::time::sleep(Duration::from_millis(50)).await;
    for i in 0..3 {
        let node = cluster.node(i);
        let stats = node.dispatcher().stats();
        assert_eq!(stats.enqueued.get(), 2, "n{i} fanned out more than once");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn nodes_without_topology_keep_values_local() {
    let cluster = Cluster::new(3);

    cluster.node(1).on_broadcast(9);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(cluster.read(1), HashSet::from([9]));
    assert!(cluster.read(0).is_empty());
    assert!(cluster.read(2).is_empty());
}
