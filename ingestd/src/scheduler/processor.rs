//! Batch processing
//!
//! The per-item work is a stand-in for a downstream call. It sits behind the
//! [`ItemWorker`] trait so the drain loop never knows what an item costs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::core::Shared;
use crate::domain::{Batch, BatchStatus};

/// Failure of a single item step
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessingError {
    #[error("Item {id} failed: {message}")]
    Worker { id: i64, message: String },

    #[error("Item {id} timed out after {after:?}")]
    Timeout { id: i64, after: Duration },

    #[error("Batch status update failed: {0}")]
    Status(String),
}

/// Performs the work for one item ID
#[async_trait]
pub trait ItemWorker: Send + Sync {
    async fn process_item(&self, id: i64) -> Result<(), ProcessingError>;
}

/// Simulated downstream call: sleeps for a fixed delay and succeeds
#[derive(Debug, Clone)]
pub struct SimulatedWorker {
    delay: Duration,
}

impl SimulatedWorker {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ItemWorker for SimulatedWorker {
    async fn process_item(&self, id: i64) -> Result<(), ProcessingError> {
        tokio::time::sleep(self.delay).await;
        debug!(id, data = "processed", "SimulatedWorker: item processed");
        Ok(())
    }
}

/// How a dispatched batch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Done,
    Failed(ProcessingError),
}

impl BatchOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Runs a batch's items in order and drives its status
pub(crate) struct BatchProcessor {
    worker: Arc<dyn ItemWorker>,
    item_timeout: Option<Duration>,
}

impl BatchProcessor {
    pub(crate) fn new(worker: Arc<dyn ItemWorker>, item_timeout: Option<Duration>) -> Self {
        Self { worker, item_timeout }
    }

    /// Process one batch: not-started -> in-progress -> done
    ///
    /// The state lock is only taken around status changes, never across an
    /// item's work. A failing item stops the batch and marks it failed; the
    /// error is logged and returned, never propagated to the submitter.
    pub(crate) async fn process(&self, batch: &Batch, shared: &Shared) -> BatchOutcome {
        debug!(batch_id = %batch.id, request_id = %batch.request_id, items = batch.items.len(), "BatchProcessor::process: called");

        if let Err(e) = shared
            .transition(&batch.request_id, &batch.id, BatchStatus::InProgress)
            .await
        {
            error!(batch_id = %batch.id, error = %e, "Error starting batch");
            return BatchOutcome::Failed(ProcessingError::Status(e.to_string()));
        }

        for &id in &batch.items {
            if let Err(e) = self.process_item(id).await {
                error!(batch_id = %batch.id, error = %e, "Error processing batch");
                if let Err(status_err) = shared
                    .transition(&batch.request_id, &batch.id, BatchStatus::Failed)
                    .await
                {
                    warn!(batch_id = %batch.id, error = %status_err, "Failed to mark batch failed");
                }
                return BatchOutcome::Failed(e);
            }
            info!(id, batch_id = %batch.id, "Processed ID");
        }

        if let Err(e) = shared
            .transition(&batch.request_id, &batch.id, BatchStatus::Done)
            .await
        {
            error!(batch_id = %batch.id, error = %e, "Error completing batch");
            return BatchOutcome::Failed(ProcessingError::Status(e.to_string()));
        }

        debug!(batch_id = %batch.id, "BatchProcessor::process: done");
        BatchOutcome::Done
    }

    async fn process_item(&self, id: i64) -> Result<(), ProcessingError> {
        match self.item_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.worker.process_item(id)).await {
                Ok(result) => result,
                Err(_) => Err(ProcessingError::Timeout { id, after: limit }),
            },
            None => self.worker.process_item(id).await,
        }
    }
}
