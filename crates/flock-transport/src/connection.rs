use crate::envelope::MessageEnvelope;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

type Slots = HashMap<u64, oneshot::Sender<MessageEnvelope>>;

/// Outstanding RPCs keyed by the `msg_id` we sent. The reader task
/// completes a slot when the matching `in_reply_to` arrives; otherwise the
/// caller's [`ReplySlot`] removes it when dropped.
pub(crate) struct PendingReplies {
    next_msg_id: AtomicU64,
    slots: Mutex<Slots>,
}

/// Registration of one outstanding RPC. Dropping it frees the slot, so a
/// caller that times out or is cancelled mid-await never leaves one behind.
pub(crate) struct ReplySlot {
    pending: Arc<PendingReplies>,
    msg_id: u64,
}

impl ReplySlot {
    pub fn msg_id(&self) -> u64 {
        self.msg_id
    }
}

impl Drop for ReplySlot {
    fn drop(&mut self) {
        self.pending.remove(self.msg_id);
    }
}

impl PendingReplies {
    pub fn new() -> Self {
        Self {
            next_msg_id: AtomicU64::new(1),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a fresh outbound `msg_id`.
    pub fn next_msg_id(&self) -> u64 {
        self.next_msg_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Allocate a `msg_id` and park a reply slot under it.
    pub fn register(self: &Arc<Self>) -> (ReplySlot, oneshot::Receiver<MessageEnvelope>) {
        let msg_id = self.next_msg_id();
        let (tx, rx) = oneshot::channel();
        self.lock().insert(msg_id, tx);
        let slot = ReplySlot {
            pending: self.clone(),
            msg_id,
        };
        (slot, rx)
    }

    /// Hand a reply to its waiting caller. Returns `false` if nobody is
    /// waiting (expired or unknown id).
    pub fn complete(&self, in_reply_to: u64, reply: MessageEnvelope) -> bool {
        let slot = self.lock().remove(&in_reply_to);
        match slot {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    fn remove(&self, msg_id: u64) {
        self.lock().remove(&msg_id);
    }

    /// Drop every slot; waiting callers observe a closed channel.
    pub fn fail_all(&self) {
        self.lock().clear();
    }

    /// Number of RPCs still waiting for a reply.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    // Never held across an await; a panic mid-insert can't corrupt the map.
    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}
