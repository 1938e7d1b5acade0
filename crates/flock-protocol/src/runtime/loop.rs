/// The request loop.
///
/// Pulls inbound requests off the node and gives each one its own short
/// task, so a slow handler never holds up the next request.
use flock_transport::{MessageEnvelope, Node, TransportError, ERROR_KIND};

use crate::error::ProtocolError;
use crate::payload::Payload;

use super::Context;

pub(super) async fn serve(mut node: Node, ctx: Context) -> Result<(), ProtocolError> {
    tracing::info!(node = %node.id(), "serving requests");

    loop {
        let request = match node.recv().await {
            Ok(request) => request,
            Err(TransportError::Shutdown) => {
                tracing::info!("input closed");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let ctx = ctx.clone();
        tokio::spawn(async move {
            respond(&ctx, &request);
        });
    }
}

/// Handle one request and send whatever it calls for back to its sender.
fn respond(ctx: &Context, request: &MessageEnvelope) {
    let result = match handle_request(ctx, request) {
        Ok(Some(reply)) => reply
            .to_body()
            .and_then(|body| ctx.handle.reply(request, body).map_err(ProtocolError::from)),
        Ok(None) => Ok(()),
        Err(e) => {
            tracing::warn!(src = %request.src, kind = %request.body.kind, "request failed: {e}");
            ctx.handle
                .reply_error(request, e.code(), &e.to_string())
                .map_err(ProtocolError::from)
        }
    };

    if let Err(e) = result {
        tracing::debug!(src = %request.src, "could not reply: {e}");
    }
}

/// The reply for `request`, if it gets one.
///
/// Acknowledgements and errors that arrive outside an RPC (typically
/// replies that came in after their deadline) are dropped without an
/// answer.
fn handle_request(
    ctx: &Context,
    request: &MessageEnvelope,
) -> Result<Option<Payload>, ProtocolError> {
    if request.body.kind == ERROR_KIND {
        tracing::debug!(src = %request.src, fields = ?request.body.fields, "stray error");
        return Ok(None);
    }

    let reply = match Payload::from_body(&request.body)? {
        Payload::Broadcast { message } => {
            ctx.coordinator.on_broadcast(message);
            Payload::BroadcastOk {}
        }
        Payload::Read {} => Payload::ReadOk {
            messages: ctx.coordinator.on_read(),
        },
        Payload::Topology { topology } => {
            ctx.coordinator.on_topology(&topology)?;
            Payload::TopologyOk {}
        }
        Payload::Generate {} => Payload::GenerateOk {
            id: ctx.ids.next().to_string(),
        },
        Payload::Unknown => {
            return Err(ProtocolError::UnsupportedKind(request.body.kind.clone()));
        }
        ack @ (Payload::BroadcastOk {}
        | Payload::ReadOk { .. }
        | Payload::TopologyOk {}
        | Payload::GenerateOk { .. }) => {
            tracing::debug!(src = %request.src, kind = ack.kind(), "stray acknowledgement");
            return Ok(None);
        }
    };
    Ok(Some(reply))
}
