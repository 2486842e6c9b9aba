//! Batch scheduler
//!
//! Priority queue, single-token rate limiter, batch processor and the drain
//! loop that ties them together.

mod config;
mod core;
mod processor;
mod queue;
mod rate_limit;

pub use config::SchedulerConfig;
pub use core::{DrainHandle, DrainOutcome, Scheduler};
pub use processor::{BatchOutcome, ItemWorker, ProcessingError, SimulatedWorker};
pub use queue::{PriorityQueue, QueueEntry, QueueState, SchedulerStats};
pub use rate_limit::RateLimiter;
