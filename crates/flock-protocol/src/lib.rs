//! flock protocol layer.
//!
//! Deduplicated gossip broadcast on top of `flock-transport`: every value
//! a node learns is recorded once and pushed to its neighbors, retrying
//! each delivery until the neighbor acknowledges it.
//!
//! Consistency: eventual. Delivery: at-least-once, unordered.

pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod payload;
pub mod runtime;
pub mod store;
pub mod topology;
pub mod types;

pub use coordinator::GossipCoordinator;
pub use dispatcher::{BroadcastDispatcher, DispatchHandle, DispatchStats, DispatcherConfig};
pub use error::ProtocolError;
pub use ids::IdGenerator;
pub use payload::Payload;
pub use runtime::transport::Transport;
pub use runtime::{Runtime, RuntimeConfig};
pub use store::MessageStore;
pub use topology::{row_for, TopologyManager};
pub use types::{DeliveryTask, NodeId, TaskState, TopologyMap, Value};
