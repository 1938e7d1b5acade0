use crate::NodeId;

/// Errors returned by the flock transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("envelope serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("envelope deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("init handshake failed: {0}")]
    Handshake(String),

    #[error("rpc to {node_id} timed out")]
    Timeout { node_id: NodeId },

    #[error("rpc to {node_id} failed with code {code}: {text}")]
    Rpc {
        node_id: NodeId,
        code: u32,
        text: String,
    },

    #[error("node is shut down")]
    Shutdown,

    #[error("invalid node id: {0:?}")]
    InvalidNodeId(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
