use std::collections::HashMap;
use std::fmt;

pub use flock_transport::NodeId;

/// A broadcast value. Opaque: only equality matters.
pub type Value = i64;

/// Full cluster adjacency as carried by a `topology` message.
pub type TopologyMap = HashMap<NodeId, Vec<NodeId>>;

/// "`destination` has not yet acknowledged `value`."
///
/// The pair is the task's identity; two tasks with equal fields are the
/// same obligation, and having both in the queue at once is harmless.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryTask {
    pub value: Value,
    pub destination: NodeId,
}

impl DeliveryTask {
    pub fn new(value: Value, destination: NodeId) -> Self {
        Self { value, destination }
    }
}

impl fmt::Display for DeliveryTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}→{}", self.value, self.destination)
    }
}

/// Where a [`DeliveryTask`] ends up once an attempt resolves.
///
/// An acknowledged task is retired; anything else sends it back to
/// `Created` for another attempt. There is no terminal failure state.
/// The in-flight phase in between is tracked by
/// [`DispatchStats::in_flight`](crate::DispatchStats::in_flight).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Created,
    Retired,
}

impl TaskState {
    /// Next state after a send attempt resolves.
    pub fn after_attempt(delivered: bool) -> Self {
        if delivered {
            TaskState::Retired
        } else {
            TaskState::Created
        }
    }
}
