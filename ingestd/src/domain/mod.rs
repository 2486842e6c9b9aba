//! Domain types for ingestd
//!
//! Requests, batches, their lifecycle, and the status views built from them.

mod batch;
mod error;
mod id;
mod priority;
mod status;

pub use batch::{Batch, BatchStatus, DEFAULT_BATCH_SIZE, IngestionRequest, MAX_ITEM_ID, MIN_ITEM_ID, validate_items};
pub use error::{IngestError, TransitionError};
pub use id::{BatchId, RequestId};
pub use priority::Priority;
pub use status::{AggregateStatus, BatchSummary, RequestStatus};
