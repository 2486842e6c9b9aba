//! Scheduler implementation

use std::sync::Arc;
use std::time::Duration;

use eyre::eyre;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::{
    Batch, BatchId, BatchStatus, IngestError, IngestionRequest, Priority, RequestId, RequestStatus,
};
use crate::state::{BatchStatusStore, RequestRegistry};

use super::config::SchedulerConfig;
use super::processor::{BatchOutcome, BatchProcessor, ItemWorker, SimulatedWorker};
use super::queue::{PriorityQueue, QueueState, SchedulerStats};
use super::rate_limit::RateLimiter;

/// Internal state protected by mutex
#[derive(Debug, Default)]
struct SchedulerInner {
    /// Submitted requests and their batch order
    registry: RequestRegistry,

    /// Lifecycle of every batch
    store: BatchStatusStore,

    /// Batches not yet dispatched
    queue: PriorityQueue,

    /// Statistics
    stats: SchedulerStats,
}

/// Queue, registry and status store behind a single lock
///
/// Every method holds the lock only for the duration of the call, so a
/// status read always sees a whole transition. Crate-private: outside
/// callers go through [`Scheduler`], which validates before enqueueing.
///
/// ```compile_fail
/// let _ = ingestd::scheduler::Shared::default();
/// ```
#[derive(Debug, Default)]
pub(crate) struct Shared {
    inner: Mutex<SchedulerInner>,
}

impl Shared {
    /// Register a request with its batches and queue every batch
    ///
    /// Registration and enqueue happen under one lock acquisition, so the
    /// drain loop never sees a request half-registered.
    pub(crate) async fn enqueue(&self, request: IngestionRequest, batches: Vec<Batch>, now: Instant) -> RequestId {
        let mut inner = self.inner.lock().await;
        let request_id = request.id.clone();
        let priority = request.priority;

        for batch in &batches {
            inner.store.insert(batch.clone());
            inner
                .queue
                .push(priority, now, request_id.clone(), batch.id.clone());
        }
        inner.registry.register(request, &batches);

        inner.stats.total_requests += 1;
        inner.stats.total_batches += batches.len() as u64;
        inner.stats.peak_queue_depth = inner.stats.peak_queue_depth.max(inner.queue.len());

        debug!(%request_id, ?priority, batches = batches.len(), queued = inner.queue.len(), "Shared::enqueue: queued");
        request_id
    }

    /// Pop the next dispatchable batch
    ///
    /// Entries whose batch already left `NotStarted` are dropped, so the
    /// queue never hands out a finished batch.
    pub(crate) async fn pop_next(&self) -> Option<Batch> {
        let mut inner = self.inner.lock().await;
        while let Some(entry) = inner.queue.pop_min() {
            match inner.store.get(&entry.request_id, &entry.batch_id) {
                Some(batch) if batch.status == BatchStatus::NotStarted => return Some(batch.clone()),
                Some(batch) => {
                    warn!(batch_id = %batch.id, status = %batch.status, "Dropping stale queue entry");
                }
                None => {
                    warn!(batch_id = %entry.batch_id, "Dropping queue entry for unknown batch");
                }
            }
        }
        None
    }

    /// Move a batch forward in its lifecycle
    pub(crate) async fn transition(
        &self,
        request_id: &RequestId,
        batch_id: &BatchId,
        next: BatchStatus,
    ) -> Result<BatchStatus, IngestError> {
        let mut inner = self.inner.lock().await;
        inner.store.transition(request_id, batch_id, next)
    }

    /// Aggregate status of a request
    pub(crate) async fn status(&self, request_id: &RequestId) -> Result<RequestStatus, IngestError> {
        let inner = self.inner.lock().await;
        inner.registry.status(request_id, &inner.store)
    }

    /// Current status of a single batch
    #[cfg(test)]
    pub(crate) async fn batch_status(&self, batch: &Batch) -> Option<BatchStatus> {
        let inner = self.inner.lock().await;
        inner.store.status(&batch.request_id, &batch.id)
    }

    async fn record_outcome(&self, outcome: &BatchOutcome) {
        let mut inner = self.inner.lock().await;
        inner.stats.total_dispatched += 1;
        if outcome.is_done() {
            inner.stats.total_completed += 1;
        } else {
            inner.stats.total_failed += 1;
        }
    }

    async fn queue_len(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    async fn snapshot(&self) -> (usize, usize, SchedulerStats) {
        let inner = self.inner.lock().await;
        (
            inner.queue.len(),
            inner.store.count_with_status(BatchStatus::InProgress),
            inner.stats.clone(),
        )
    }
}

/// Result of one drain attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// A batch was dispatched and processed
    Dispatched {
        request_id: RequestId,
        batch_id: BatchId,
        outcome: BatchOutcome,
    },

    /// Nothing queued
    Empty,

    /// Work is queued but the rate limiter is closed
    RateLimited { retry_after: Duration },
}

/// The Scheduler accepts submissions, drains batches one at a time in
/// priority order at a bounded rate, and answers status lookups.
pub struct Scheduler {
    config: SchedulerConfig,
    shared: Shared,
    /// Held for the whole of a dispatch, which makes the drain point single
    limiter: Mutex<RateLimiter>,
    processor: BatchProcessor,
}

impl Scheduler {
    /// Create a scheduler whose items are simulated with the configured delay
    pub fn new(config: SchedulerConfig) -> Self {
        let worker = Arc::new(SimulatedWorker::new(config.item_delay()));
        Self::with_worker(config, worker)
    }

    /// Create a scheduler with a custom item worker
    pub fn with_worker(config: SchedulerConfig, worker: Arc<dyn ItemWorker>) -> Self {
        debug!(?config, "Scheduler::new: called");
        Self {
            limiter: Mutex::new(RateLimiter::new(config.rate_limit())),
            processor: BatchProcessor::new(worker, config.item_timeout()),
            shared: Shared::default(),
            config,
        }
    }

    /// Accept a submission
    ///
    /// Validates every ID first; on failure nothing is registered. On success
    /// the items are split into batches which are queued immediately. Never
    /// waits on the rate limiter.
    pub async fn submit(&self, items: Vec<i64>, priority: Priority) -> Result<RequestId, IngestError> {
        debug!(items = items.len(), ?priority, "Scheduler::submit: called");
        let request = IngestionRequest::new(items, priority)?;
        let batches = request.split_into_batches(self.config.batch_size);
        let request_id = self.shared.enqueue(request, batches, Instant::now()).await;
        info!(%request_id, ?priority, "Ingestion request accepted");
        Ok(request_id)
    }

    /// Look up a request's aggregate and per-batch status
    pub async fn get_status(&self, request_id: &RequestId) -> Result<RequestStatus, IngestError> {
        debug!(%request_id, "Scheduler::get_status: called");
        self.shared.status(request_id).await
    }

    /// Dispatch at most one batch
    ///
    /// If the limiter is open and the queue is not empty, pops the smallest
    /// entry, processes it to completion, then records the dispatch time.
    pub async fn drain_once(&self) -> DrainOutcome {
        let mut limiter = self.limiter.lock().await;
        let now = Instant::now();

        if !limiter.may_dispatch(now) {
            if self.shared.queue_len().await == 0 {
                return DrainOutcome::Empty;
            }
            let retry_after = limiter.retry_after(now);
            debug!(?retry_after, "Scheduler::drain_once: rate limited");
            return DrainOutcome::RateLimited { retry_after };
        }

        let Some(batch) = self.shared.pop_next().await else {
            return DrainOutcome::Empty;
        };

        debug!(batch_id = %batch.id, request_id = %batch.request_id, "Scheduler::drain_once: dispatching");
        let outcome = self.processor.process(&batch, &self.shared).await;
        limiter.record_dispatch(Instant::now());
        drop(limiter);

        self.shared.record_outcome(&outcome).await;
        DrainOutcome::Dispatched {
            request_id: batch.request_id,
            batch_id: batch.id,
            outcome,
        }
    }

    /// Run the drain loop until a shutdown signal arrives or the sender is dropped
    ///
    /// An in-flight dispatch always finishes before the loop exits.
    pub async fn run(&self, mut shutdown_rx: mpsc::Receiver<()>) {
        let poll = self.config.poll_interval();
        info!(
            rate_limit_ms = self.config.rate_limit_ms,
            poll_ms = poll.as_millis() as u64,
            batch_size = self.config.batch_size,
            "Drain loop started"
        );

        loop {
            match self.drain_once().await {
                DrainOutcome::Dispatched { .. } => {
                    if !matches!(shutdown_rx.try_recv(), Err(mpsc::error::TryRecvError::Empty)) {
                        debug!("run: shutdown signal received after dispatch");
                        break;
                    }
                }
                DrainOutcome::Empty | DrainOutcome::RateLimited { .. } => {
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            debug!("run: shutdown signal received");
                            break;
                        }
                        _ = tokio::time::sleep(poll) => {}
                    }
                }
            }
        }

        info!("Drain loop stopped");
    }

    /// Start the drain loop on its own task
    pub fn spawn(self: Arc<Self>) -> DrainHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let timeout = self.config.shutdown_timeout();
        let handle = tokio::spawn(async move { self.run(shutdown_rx).await });
        DrainHandle {
            shutdown_tx,
            handle,
            timeout,
        }
    }

    /// Poll until the request reaches `done` or `failed`
    pub async fn wait_for_request(&self, request_id: &RequestId, poll: Duration) -> Result<RequestStatus, IngestError> {
        loop {
            let status = self.get_status(request_id).await?;
            if status.status.is_terminal() {
                return Ok(status);
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Get current queue state
    pub async fn queue_state(&self) -> QueueState {
        debug!("Scheduler::queue_state: called");
        // A busy limiter means a dispatch is in flight
        let rate_limited = match self.limiter.try_lock() {
            Ok(limiter) => !limiter.may_dispatch(Instant::now()),
            Err(_) => true,
        };
        let (queued, in_progress, stats) = self.shared.snapshot().await;
        QueueState {
            queued,
            in_progress,
            rate_limited,
            stats,
        }
    }

    /// Get the scheduler statistics
    pub async fn stats(&self) -> SchedulerStats {
        self.shared.snapshot().await.2
    }
}

/// Handle to a running drain loop
pub struct DrainHandle {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
    timeout: Duration,
}

impl DrainHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop scheduling new dispatches and wait for the loop to exit
    ///
    /// Waits at most the configured shutdown timeout, then aborts the task.
    pub async fn shutdown(mut self) -> eyre::Result<()> {
        debug!("DrainHandle::shutdown: called");
        // A closed channel means the loop already exited
        let _ = self.shutdown_tx.send(()).await;

        match tokio::time::timeout(self.timeout, &mut self.handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(eyre!("Drain loop task failed: {}", e)),
            Err(_) => {
                warn!(timeout = ?self.timeout, "Drain loop did not stop in time, aborting");
                self.handle.abort();
                Err(eyre!("Drain loop did not stop within {:?}", self.timeout))
            }
        }
    }
}
