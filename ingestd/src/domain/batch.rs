//! Ingestion requests and the batches they are split into

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{IngestError, TransitionError};
use super::id::{BatchId, RequestId};
use super::priority::Priority;

/// Smallest accepted item ID
pub const MIN_ITEM_ID: i64 = 1;

/// Largest accepted item ID (10^9 + 7)
pub const MAX_ITEM_ID: i64 = 1_000_000_007;

/// Default number of items per batch
pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Check every item ID against the accepted range
///
/// Fails on the first offending ID so the caller can name it. An empty
/// submission is rejected too: a request always owns at least one batch.
pub fn validate_items(items: &[i64]) -> Result<(), IngestError> {
    if items.is_empty() {
        return Err(IngestError::EmptySubmission);
    }
    match items.iter().find(|id| !(MIN_ITEM_ID..=MAX_ITEM_ID).contains(*id)) {
        Some(&id) => Err(IngestError::Validation { id }),
        None => Ok(()),
    }
}

/// A caller submission. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionRequest {
    pub id: RequestId,
    pub items: Vec<i64>,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}

impl IngestionRequest {
    /// Validate the items and build a request with a fresh id
    pub fn new(items: Vec<i64>, priority: Priority) -> Result<Self, IngestError> {
        validate_items(&items)?;
        Ok(Self {
            id: RequestId::generate(),
            items,
            priority,
            created_at: Utc::now(),
        })
    }

    /// Split the items into contiguous batches of at most `batch_size`
    ///
    /// Only the last batch may be shorter than `batch_size`.
    pub fn split_into_batches(&self, batch_size: usize) -> Vec<Batch> {
        let size = batch_size.max(1);
        let batches: Vec<Batch> = self
            .items
            .chunks(size)
            .map(|chunk| Batch::new(self.id.clone(), chunk.to_vec()))
            .collect();
        debug!(request_id = %self.id, count = batches.len(), size, "split_into_batches: done");
        batches
    }
}

/// Lifecycle of a batch
///
/// Moves strictly forward: `NotStarted -> InProgress -> Done | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Queued, not yet dispatched
    #[default]
    NotStarted,
    /// Dispatched, items being processed
    InProgress,
    /// Every item processed
    Done,
    /// An item step failed; terminal
    Failed,
}

impl BatchStatus {
    /// Whether the batch can never change again
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `next` is a legal successor of this status
    pub fn can_transition_to(self, next: BatchStatus) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::InProgress) | (Self::InProgress, Self::Done) | (Self::InProgress, Self::Failed)
        )
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A capacity-bounded chunk of a request's items; the unit of scheduling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub request_id: RequestId,
    pub items: Vec<i64>,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
}

impl Batch {
    /// Create a not-started batch with a fresh id
    pub fn new(request_id: RequestId, items: Vec<i64>) -> Self {
        Self {
            id: BatchId::generate(),
            request_id,
            items,
            status: BatchStatus::NotStarted,
            created_at: Utc::now(),
        }
    }

    /// Move to `next`, rejecting anything but a forward step
    ///
    /// Returns the previous status.
    pub fn transition(&mut self, next: BatchStatus) -> Result<BatchStatus, TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                batch_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        let previous = self.status;
        self.status = next;
        debug!(batch_id = %self.id, %previous, %next, "Batch::transition");
        Ok(previous)
    }
}
