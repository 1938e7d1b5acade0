use crate::connection::PendingReplies;
use crate::envelope::MessageEnvelope;
use crate::TransportError;

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

/// Write one envelope line, newline-terminated, and flush.
pub(crate) async fn write_line<W>(writer: &mut W, line: &str) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Check a raw inbound line against the size limit and decode it.
pub(crate) fn decode_line(line: &str, max_size: usize) -> Result<MessageEnvelope, TransportError> {
    if line.len() > max_size {
        return Err(TransportError::MessageTooLarge {
            size: line.len(),
            max: max_size,
        });
    }
    MessageEnvelope::from_line(line).map_err(TransportError::Deserialization)
}

/// Drain the outbound channel into the writer until every sender is gone.
pub(crate) async fn writer_loop<W>(mut writer: W, mut outbound_rx: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = outbound_rx.recv().await {
        if let Err(e) = write_line(&mut writer, &line).await {
            tracing::error!("write failed, stopping writer: {e}");
            break;
        }
    }
}

/// Internal state shared with the reader task.
pub(crate) struct ReaderState {
    pub incoming_tx: mpsc::Sender<MessageEnvelope>,
    pub pending: Arc<PendingReplies>,
    pub max_message_size: usize,
}

/// Read envelopes line by line. Replies complete their pending RPC slot,
/// everything else goes to the request channel.
pub(crate) async fn reader_loop<R>(reader: R, state: ReaderState)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break, // end of input
            Err(e) => {
                tracing::error!("read failed, stopping reader: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let envelope = match decode_line(&line, state.max_message_size) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("dropping inbound line: {e}");
                continue;
            }
        };

        if let Some(in_reply_to) = envelope.body.in_reply_to {
            if !state.pending.complete(in_reply_to, envelope) {
                tracing::debug!("late or unsolicited reply to msg {in_reply_to}");
            }
            continue;
        }

        if state.incoming_tx.send(envelope).await.is_err() {
            break; // node dropped
        }
    }

    // Wake any RPC still waiting so callers see Shutdown instead of a timeout.
    state.pending.fail_all();
}
