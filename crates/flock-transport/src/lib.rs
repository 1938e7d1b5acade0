//! flock transport layer.
//!
//! Speaks line-delimited JSON envelopes over any async byte stream
//! (stdin/stdout in production), performs the `init` handshake and
//! correlates replies with the RPCs that caused them.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use flock_transport::{Body, Node, NodeConfig};
//!
//! # async fn example() -> Result<(), flock_transport::TransportError> {
//! let mut node = Node::stdio(NodeConfig::new()).await?;
//! let handle = node.handle();
//! eprintln!("My ID: {}", node.id());
//!
//! // Answer requests
//! let request = node.recv().await?;
//! handle.reply(&request, Body::new("echo_ok"))?;
//!
//! // Call a peer
//! let peer = "n2".parse()?;
//! let reply = handle.rpc(&peer, Body::new("read"), Duration::from_millis(100)).await?;
//! eprintln!("{:?}", reply.body.fields);
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod envelope;
mod error;
mod node;
mod protocol;

pub use config::NodeConfig;
pub use envelope::{error_code, Body, MessageEnvelope, ERROR_KIND};
pub use error::TransportError;
pub use node::{Node, NodeHandle};

use std::fmt;
use std::str::FromStr;

/// Cluster identity of a node or client, e.g. `n3` or `c12`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);

impl NodeId {
    /// The identity as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl FromStr for NodeId {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(TransportError::InvalidNodeId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl serde::Serialize for NodeId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NodeId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
