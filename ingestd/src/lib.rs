//! ingestd - priority-ordered, rate-limited batch ingestion
//!
//! Callers submit lists of item IDs with a priority. Each submission is split
//! into fixed-size batches, queued by `(priority, arrival time)`, and drained
//! by a single loop that dispatches at most one batch per rate-limit window.
//! Status is tracked per batch and aggregated per request.
//!
//! # Modules
//!
//! - [`domain`] - Requests, batches, priorities, ids and errors
//! - [`state`] - Request registry and batch status store
//! - [`scheduler`] - Priority queue, rate limiter, batch processor and drain loop
//! - [`ipc`] - Newline-delimited JSON transport over TCP
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod ipc;
pub mod scheduler;
pub mod state;

// Re-export commonly used types
pub use config::{Config, ServerConfig};
pub use domain::{
    AggregateStatus, Batch, BatchId, BatchStatus, BatchSummary, IngestError, IngestionRequest, Priority, RequestId,
    RequestStatus, TransitionError,
};
pub use ipc::{ClientMessage, ErrorKind, IngestClient, ServerResponse};
pub use scheduler::{
    BatchOutcome, DrainHandle, DrainOutcome, ItemWorker, ProcessingError, QueueState, Scheduler, SchedulerConfig,
    SchedulerStats, SimulatedWorker,
};
pub use state::{BatchStatusStore, RequestRegistry};
