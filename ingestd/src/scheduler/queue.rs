//! Priority queue of pending batches

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tokio::time::Instant;

use crate::domain::{BatchId, Priority, RequestId};

/// A pending batch waiting for dispatch
///
/// Key is `(priority weight, enqueue time, sequence)`; the sequence number
/// keeps FIFO order strict when two entries share an instant. Entries are
/// never mutated once queued.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub priority: Priority,
    pub enqueued_at: Instant,
    pub seq: u64,
    pub request_id: RequestId,
    pub batch_id: BatchId,
}

impl QueueEntry {
    fn key(&self) -> (u8, Instant, u64) {
        (self.priority.weight(), self.enqueued_at, self.seq)
    }
}

impl Eq for QueueEntry {}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Ascending: the smallest key is served first
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-queue over `QueueEntry`
#[derive(Debug, Default)]
pub struct PriorityQueue {
    heap: BinaryHeap<Reverse<QueueEntry>>,
    next_seq: u64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a batch; never fails
    pub fn push(&mut self, priority: Priority, enqueued_at: Instant, request_id: RequestId, batch_id: BatchId) {
        let entry = QueueEntry {
            priority,
            enqueued_at,
            seq: self.next_seq,
            request_id,
            batch_id,
        };
        self.next_seq += 1;
        self.heap.push(Reverse(entry));
    }

    /// Remove and return the smallest entry
    pub fn pop_min(&mut self) -> Option<QueueEntry> {
        self.heap.pop().map(|Reverse(entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Statistics for the scheduler
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SchedulerStats {
    pub total_requests: u64,
    pub total_batches: u64,
    pub total_dispatched: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    pub peak_queue_depth: usize,
}

/// Snapshot of the scheduler for status displays
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QueueState {
    pub queued: usize,
    pub in_progress: usize,
    pub rate_limited: bool,
    pub stats: SchedulerStats,
}
