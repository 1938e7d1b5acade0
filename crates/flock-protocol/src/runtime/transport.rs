use std::time::Duration;

use flock_transport::NodeHandle;

use crate::error::ProtocolError;
use crate::payload::Payload;
use crate::types::{NodeId, Value};

/// Network seam for the dispatcher: one bounded-time delivery attempt.
///
/// In production: implemented by [`NodeHandle`] (RPC over stdio).
/// In tests: mocks and simulated clusters.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Deliver `value` to `target`. `Ok` only once `target` acknowledged;
    /// any error, timeout included, means "try again".
    async fn send_value(
        &self,
        target: &NodeId,
        value: Value,
        timeout: Duration,
    ) -> Result<(), ProtocolError>;
}

// ── Impl for NodeHandle (production) ────────────────────────────────

#[async_trait::async_trait]
impl Transport for NodeHandle {
    async fn send_value(
        &self,
        target: &NodeId,
        value: Value,
        timeout: Duration,
    ) -> Result<(), ProtocolError> {
        let body = Payload::Broadcast { message: value }.to_body()?;
        let reply = self.rpc(target, body, timeout).await?;

        let expected = Payload::BroadcastOk {}.kind();
        if reply.body.kind != expected {
            return Err(ProtocolError::UnexpectedReply {
                node_id: target.to_string(),
                expected,
                got: reply.body.kind,
            });
        }
        Ok(())
    }
}

// ── MockTransport (tests) ───────────────────────────────────────────
