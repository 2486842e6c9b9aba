//! In-memory ingestion state
//!
//! The request registry and the batch status store. Neither type is
//! synchronized on its own; the scheduler owns both behind one lock.

mod registry;
mod store;

pub use registry::RequestRegistry;
pub use store::BatchStatusStore;
