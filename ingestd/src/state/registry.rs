//! Request registry: which batches belong to which submission

use std::collections::HashMap;

use tracing::debug;

use super::store::BatchStatusStore;
use crate::domain::{Batch, BatchId, IngestError, IngestionRequest, RequestId, RequestStatus};

#[derive(Debug)]
struct Registered {
    request: IngestionRequest,
    batch_ids: Vec<BatchId>,
}

/// Maps each ingestion request to its batches, in split order
///
/// Entries live for the lifetime of the process.
#[derive(Debug, Default)]
pub struct RequestRegistry {
    requests: HashMap<RequestId, Registered>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request together with the ids of its batches
    pub fn register(&mut self, request: IngestionRequest, batches: &[Batch]) {
        let batch_ids = batches.iter().map(|b| b.id.clone()).collect();
        debug!(request_id = %request.id, batches = batches.len(), "RequestRegistry::register");
        self.requests
            .insert(request.id.clone(), Registered { request, batch_ids });
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Build the aggregate status of a request from the batch store
    pub fn status(&self, request_id: &RequestId, store: &BatchStatusStore) -> Result<RequestStatus, IngestError> {
        let registered = self
            .requests
            .get(request_id)
            .ok_or_else(|| IngestError::NotFound(request_id.clone()))?;

        let batches = registered
            .batch_ids
            .iter()
            .map(|batch_id| {
                store
                    .get(request_id, batch_id)
                    .cloned()
                    .ok_or_else(|| IngestError::UnknownBatch {
                        request_id: request_id.clone(),
                        batch_id: batch_id.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RequestStatus::from_batches(registered.request.id.clone(), &batches))
    }
}
