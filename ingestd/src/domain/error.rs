//! Errors surfaced by the ingestion core

use thiserror::Error;

use super::batch::{BatchStatus, MAX_ITEM_ID, MIN_ITEM_ID};
use super::id::{BatchId, RequestId};

/// Errors returned to callers of submit / get_status
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("ID {id} is out of valid range ({MIN_ITEM_ID} to {MAX_ITEM_ID})")]
    Validation { id: i64 },

    #[error("Submission contains no IDs")]
    EmptySubmission,

    #[error("Ingestion ID not found: {0}")]
    NotFound(RequestId),

    #[error("Batch {batch_id} not found under ingestion {request_id}")]
    UnknownBatch { request_id: RequestId, batch_id: BatchId },

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl IngestError {
    /// True for errors caused by caller input (the 400-class errors)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::EmptySubmission)
    }

    /// True for unknown-request lookups (the 404-class error)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// A batch status change that would move the lifecycle backwards
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Batch {batch_id} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub batch_id: BatchId,
    pub from: BatchStatus,
    pub to: BatchStatus,
}
