/// Broadcast dispatcher: at-least-once delivery of [`DeliveryTask`]s over
/// an unreliable one-shot send.
///
/// A fixed pool of workers drains one unbounded MPMC queue. Each worker
/// takes a task, makes one bounded-time attempt, and either retires the
/// task (acknowledged) or puts it back (failure or timeout). Nothing is
/// ever abandoned: the only ways out are success or shutdown.
///
/// ```text
/// Created ──> attempt ──> Retired
///    ^           │
///    └───────────┘  failure / timeout
/// ```
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::task::JoinHandle;

use flock_metrics::{Counter, Gauge};

use crate::error::ProtocolError;
use crate::runtime::transport::Transport;
use crate::types::{DeliveryTask, NodeId, TaskState, Value};

// ── Configuration ─────────────────────────────────────────────────────

/// Dispatcher tuning.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Number of workers, i.e. the cap on concurrent outbound sends.
    pub workers: usize,
    /// Deadline for a single delivery attempt.
    pub send_timeout: Duration,
    /// Fixed delay before a failed task is re-queued. Zero = immediate.
    pub retry_backoff: Duration,
    /// Upper bound of a uniform random delay added to `retry_backoff`.
    pub retry_jitter: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            send_timeout: Duration::from_millis(100),
            retry_backoff: Duration::ZERO,
            retry_jitter: Duration::ZERO,
        }
    }
}

impl DispatcherConfig {
    fn validate(&self) -> Result<(), ProtocolError> {
        if self.workers == 0 {
            return Err(ProtocolError::Config("dispatcher needs at least one worker".into()));
        }
        if self.send_timeout.is_zero() {
            return Err(ProtocolError::Config("send_timeout must be non-zero".into()));
        }
        Ok(())
    }

    /// Delay before re-queuing a failed task.
    fn retry_delay(&self) -> Duration {
        if self.retry_jitter.is_zero() {
            return self.retry_backoff;
        }
        let max = self.retry_jitter.as_millis() as u64;
        self.retry_backoff + Duration::from_millis(rand::rng().random_range(0..=max))
    }
}

// ── Stats ─────────────────────────────────────────────────────────────

/// Live delivery statistics.
#[derive(Debug, Default, Serialize)]
pub struct DispatchStats {
    /// Tasks accepted from the coordinator (re-queues not counted).
    pub enqueued: Counter,
    /// Send attempts started.
    pub attempts: Counter,
    /// Attempts that failed or timed out.
    pub failures: Counter,
    /// Tasks acknowledged and dropped.
    pub retired: Counter,
    /// Attempts currently waiting on the network.
    pub in_flight: Gauge,
    /// Tasks sitting in the queue.
    pub queued: Gauge,
}

// ── Queue ─────────────────────────────────────────────────────────────

/// Producer side of the task queue. Cheap to clone.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: async_channel::Sender<DeliveryTask>,
    stats: Arc<DispatchStats>,
}

impl DispatchHandle {
    /// Queue one task. Returns `false` once the dispatcher is shut down.
    pub fn enqueue(&self, task: DeliveryTask) -> bool {
        if self.push(task) {
            self.stats.enqueued.inc();
            true
        } else {
            false
        }
    }

    /// Queue `value` for every destination. Returns how many were queued.
    pub fn enqueue_all<I>(&self, value: Value, destinations: I) -> usize
    where
        I: IntoIterator<Item = NodeId>,
    {
        destinations
            .into_iter()
            .filter(|dst| self.enqueue(DeliveryTask::new(value, dst.clone())))
            .count()
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Tasks waiting in the queue right now (in-flight ones excluded).
    pub fn pending(&self) -> usize {
        self.tx.len()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn push(&self, task: DeliveryTask) -> bool {
        match self.tx.try_send(task) {
            Ok(()) => {
                self.stats.queued.inc();
                true
            }
            Err(e) => {
                tracing::debug!(task = %e.into_inner(), "dispatcher closed, dropping task");
                false
            }
        }
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────

/// Owns the worker pool. Drop or [`shutdown`](Self::shutdown) to stop it.
pub struct BroadcastDispatcher {
    handle: DispatchHandle,
    workers: Vec<JoinHandle<()>>,
}

impl BroadcastDispatcher {
    /// Start `config.workers` workers sending through `transport`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T: Transport>(
        transport: Arc<T>,
        config: DispatcherConfig,
    ) -> Result<Self, ProtocolError> {
        config.validate()?;

        let (tx, rx) = async_channel::unbounded();
        let handle = DispatchHandle {
            tx,
            stats: Arc::new(DispatchStats::default()),
        };
        let config = Arc::new(config);

        let workers = (0..config.workers)
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    transport.clone(),
                    rx.clone(),
                    handle.clone(),
                    config.clone(),
                ))
            })
            .collect();

        tracing::info!(workers = config.workers, "broadcast dispatcher started");
        Ok(Self { handle, workers })
    }

    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.handle.stats
    }

    /// Close the queue and stop every worker. Pending and in-flight
    /// tasks are lost.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        let lost = self.handle.pending();
        self.handle.tx.close();
        for worker in self.workers.drain(..) {
            worker.abort();
        }
        tracing::info!(lost, "broadcast dispatcher stopped");
    }
}

impl Drop for BroadcastDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Workers ───────────────────────────────────────────────────────────

async fn worker_loop<T: Transport>(
    worker: usize,
    transport: Arc<T>,
    rx: async_channel::Receiver<DeliveryTask>,
    queue: DispatchHandle,
    config: Arc<DispatcherConfig>,
) {
    while let Ok(task) = rx.recv().await {
        queue.stats.queued.dec();

        let delivered = attempt(transport.as_ref(), &task, &config, &queue.stats).await;

        match TaskState::after_attempt(delivered) {
            TaskState::Retired => {
                queue.stats.retired.inc();
                tracing::trace!(worker, %task, "retired");
            }
            TaskState::Created => {
                queue.stats.failures.inc();
                requeue(task, &queue, &config).await;
            }
        }
    }
    tracing::trace!(worker, "queue closed, worker exiting");
}

/// One bounded attempt. The deadline is enforced here as well as passed
/// to the transport, so a transport that ignores it can't stall a worker.
async fn attempt<T: Transport>(
    transport: &T,
    task: &DeliveryTask,
    config: &DispatcherConfig,
    stats: &DispatchStats,
) -> bool {
    stats.attempts.inc();
    let _in_flight = stats.in_flight.track();

    let send = transport.send_value(&task.destination, task.value, config.send_timeout);
    match tokio::time::timeout(config.send_timeout, send).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::debug!(%task, "send failed: {e}");
            false
        }
        Err(_) => {
            tracing::debug!(%task, timeout = ?config.send_timeout, "send timed out");
            false
        }
    }
}

/// Put a failed task back. With no delay configured the task goes
/// straight back on the queue; otherwise a timer re-queues it so the
/// worker is free in the meantime.
async fn requeue(task: DeliveryTask, queue: &DispatchHandle, config: &DispatcherConfig) {
    let delay = config.retry_delay();

    if delay.is_zero() {
        queue.push(task);
        // A dead peer with instant failures would otherwise keep this
        // worker spinning without ever giving up the thread.
        tokio::task::yield_now().await;
        return;
    }

    let queue = queue.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        queue.push(task);
    });
}
