use crate::config::NodeConfig;
use crate::connection::PendingReplies;
use crate::envelope::{Body, MessageEnvelope};
use crate::protocol::{self, ReaderState};
use crate::{NodeId, TransportError};

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

/// A flock transport node: handshake, send, receive and RPC.
///
/// This is the main entry point for consumers. It owns the inbound
/// request stream; cloneable [`NodeHandle`]s do the sending.
pub struct Node {
    handle: NodeHandle,
    incoming_rx: mpsc::Receiver<MessageEnvelope>,
}

/// Sending half of a [`Node`]. Cheap to clone, safe to share across tasks.
#[derive(Clone)]
pub struct NodeHandle {
    inner: Arc<Inner>,
}

struct Inner {
    id: NodeId,
    node_ids: Vec<NodeId>,
    outbound_tx: mpsc::UnboundedSender<String>,
    pending: Arc<PendingReplies>,
    max_message_size: usize,
}

#[derive(Deserialize)]
struct InitFields {
    node_id: NodeId,
    node_ids: Vec<NodeId>,
}

impl Node {
    /// Bind to a byte stream pair and complete the `init` handshake.
    ///
    /// Spawns the reader and writer tasks, waits for the first message
    /// (which must be `init`), records this node's identity and the
    /// cluster membership, and answers `init_ok`.
    pub async fn bind<R, W>(config: NodeConfig, reader: R, writer: W) -> Result<Self, TransportError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        config.validate()?;

        let (incoming_tx, mut incoming_rx) = mpsc::channel(config.recv_buffer);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(PendingReplies::new());

        tokio::spawn(protocol::writer_loop(writer, outbound_rx));
        tokio::spawn(protocol::reader_loop(
            reader,
            ReaderState {
                incoming_tx,
                pending: pending.clone(),
                max_message_size: config.max_message_size,
            },
        ));

        let init = incoming_rx
            .recv()
            .await
            .ok_or_else(|| TransportError::Handshake("input closed before init".into()))?;
        let fields = parse_init(&init)?;

        let handle = NodeHandle {
            inner: Arc::new(Inner {
                id: fields.node_id,
                node_ids: fields.node_ids,
                outbound_tx,
                pending,
                max_message_size: config.max_message_size,
            }),
        };
        handle.reply(&init, Body::new("init_ok"))?;

        tracing::info!(
            node_id = %handle.id(),
            cluster_size = handle.node_ids().len(),
            "node initialised"
        );

        Ok(Self {
            handle,
            incoming_rx,
        })
    }

    /// Bind to the process's stdin/stdout.
    pub async fn stdio(config: NodeConfig) -> Result<Self, TransportError> {
        Self::bind(config, tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// This node's identity, as assigned by `init`.
    pub fn id(&self) -> &NodeId {
        self.handle.id()
    }

    /// A sending handle for this node.
    pub fn handle(&self) -> NodeHandle {
        self.handle.clone()
    }

    /// Receive the next inbound request. Blocks until one arrives.
    ///
    /// Replies to our own RPCs never show up here.
    pub async fn recv(&mut self) -> Result<MessageEnvelope, TransportError> {
        self.incoming_rx.recv().await.ok_or(TransportError::Shutdown)
    }
}

impl NodeHandle {
    /// This node's identity.
    pub fn id(&self) -> &NodeId {
        &self.inner.id
    }

    /// Every node in the cluster, this one included, in `init` order.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.inner.node_ids
    }

    /// Fire-and-forget send.
    pub fn send(&self, dest: &NodeId, body: Body) -> Result<(), TransportError> {
        let envelope = MessageEnvelope::new(self.inner.id.clone(), dest.clone(), body);
        let line = envelope
            .to_line()
            .map_err(TransportError::Serialization)?;

        if line.len() > self.inner.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: line.len(),
                max: self.inner.max_message_size,
            });
        }

        self.inner
            .outbound_tx
            .send(line)
            .map_err(|_| TransportError::Shutdown)
    }

    /// Answer `request` with `body`.
    pub fn reply(&self, request: &MessageEnvelope, mut body: Body) -> Result<(), TransportError> {
        body.msg_id = Some(self.inner.pending.next_msg_id());
        body.in_reply_to = request.body.msg_id;
        self.send(&request.src, body)
    }

    /// Answer `request` with an error body.
    pub fn reply_error(
        &self,
        request: &MessageEnvelope,
        code: u32,
        text: &str,
    ) -> Result<(), TransportError> {
        self.reply(request, Body::error(code, text))
    }

    /// Send `body` to `dest` and wait up to `timeout` for the reply.
    ///
    /// An `error` reply comes back as [`TransportError::Rpc`]. Cancel-safe:
    /// dropping the future before it resolves releases its reply slot.
    pub async fn rpc(
        &self,
        dest: &NodeId,
        mut body: Body,
        timeout: Duration,
    ) -> Result<MessageEnvelope, TransportError> {
        let (slot, rx) = self.inner.pending.register();
        body.msg_id = Some(slot.msg_id());
        self.send(dest, body)?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => match reply.body.as_error() {
                Some((code, text)) => Err(TransportError::Rpc {
                    node_id: dest.clone(),
                    code,
                    text,
                }),
                None => Ok(reply),
            },
            Ok(Err(_)) => Err(TransportError::Shutdown),
            Err(_) => Err(TransportError::Timeout {
                node_id: dest.clone(),
            }),
        }
    }
}

fn parse_init(envelope: &MessageEnvelope) -> Result<InitFields, TransportError> {
    if envelope.body.kind != "init" {
        return Err(TransportError::Handshake(format!(
            "expected init, got {}",
            envelope.body.kind
        )));
    }

    let fields: InitFields =
        serde_json::from_value(serde_json::Value::Object(envelope.body.fields.clone()))
            .map_err(|e| TransportError::Handshake(format!("bad init body: {e}")))?;

    if !fields.node_ids.contains(&fields.node_id) {
        return Err(TransportError::Handshake(format!(
            "{} missing from node_ids",
            fields.node_id
        )));
    }
    Ok(fields)
}
