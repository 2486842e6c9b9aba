//! Per-batch lifecycle state

use std::collections::HashMap;

use tracing::debug;

use crate::domain::{Batch, BatchId, BatchStatus, IngestError, RequestId};

/// Tracks every batch's lifecycle, grouped by request id
#[derive(Debug, Default)]
pub struct BatchStatusStore {
    batches: HashMap<RequestId, HashMap<BatchId, Batch>>,
}

impl BatchStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly created batch
    ///
    /// A batch is stored once; inserting an existing key replaces nothing and
    /// returns false.
    pub fn insert(&mut self, batch: Batch) -> bool {
        let by_id = self.batches.entry(batch.request_id.clone()).or_default();
        if by_id.contains_key(&batch.id) {
            debug!(batch_id = %batch.id, "BatchStatusStore::insert: duplicate key ignored");
            return false;
        }
        by_id.insert(batch.id.clone(), batch);
        true
    }

    /// Look up a batch
    pub fn get(&self, request_id: &RequestId, batch_id: &BatchId) -> Option<&Batch> {
        self.batches.get(request_id)?.get(batch_id)
    }

    /// Current status of a batch
    pub fn status(&self, request_id: &RequestId, batch_id: &BatchId) -> Option<BatchStatus> {
        self.get(request_id, batch_id).map(|b| b.status)
    }

    /// Move a batch forward in its lifecycle
    ///
    /// Returns the previous status. Backward or repeated moves are rejected
    /// and leave the batch untouched.
    pub fn transition(
        &mut self,
        request_id: &RequestId,
        batch_id: &BatchId,
        next: BatchStatus,
    ) -> Result<BatchStatus, IngestError> {
        let batch = self
            .batches
            .get_mut(request_id)
            .and_then(|by_id| by_id.get_mut(batch_id))
            .ok_or_else(|| IngestError::UnknownBatch {
                request_id: request_id.clone(),
                batch_id: batch_id.clone(),
            })?;
        Ok(batch.transition(next)?)
    }

    /// Number of stored batches
    pub fn len(&self) -> usize {
        self.batches.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.values().all(HashMap::is_empty)
    }

    /// Count batches currently in `status`
    pub fn count_with_status(&self, status: BatchStatus) -> usize {
        self.batches
            .values()
            .flat_map(HashMap::values)
            .filter(|b| b.status == status)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(store: &mut BatchStatusStore, request: &str, items: Vec<i64>) -> Batch {
        let batch = Batch::new(RequestId::from(request), items);
        assert!(store.insert(batch.clone()));
        batch
    }

    #[test]
    fn test_insert_and_get() {
        let mut store = BatchStatusStore::new();
        let batch = stored(&mut store, "r1", vec![1, 2]);

        let found = store.get(&batch.request_id, &batch.id).unwrap();
        assert_eq!(found.items, vec![1, 2]);
        assert_eq!(found.status, BatchStatus::NotStarted);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_insert_ignored() {
        let mut store = BatchStatusStore::new();
        let batch = stored(&mut store, "r1", vec![1]);
        assert!(!store.insert(batch));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_lookup_requires_matching_request() {
        let mut store = BatchStatusStore::new();
        let batch = stored(&mut store, "r1", vec![1]);
        assert!(store.get(&RequestId::from("r2"), &batch.id).is_none());
        assert!(store.get(&batch.request_id, &BatchId::from("other")).is_none());
    }

    #[test]
    fn test_len_counts_across_requests() {
        let mut store = BatchStatusStore::new();
        assert!(store.is_empty());
        stored(&mut store, "r1", vec![1]);
        stored(&mut store, "r1", vec![2]);
        stored(&mut store, "r2", vec![3]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.count_with_status(BatchStatus::NotStarted), 3);
        assert!(!store.is_empty());
    }

    #[test]
    fn test_transition_updates_status() {
        let mut store = BatchStatusStore::new();
        let batch = stored(&mut store, "r1", vec![1]);

        let previous = store
            .transition(&batch.request_id, &batch.id, BatchStatus::InProgress)
            .unwrap();
        assert_eq!(previous, BatchStatus::NotStarted);
        assert_eq!(store.status(&batch.request_id, &batch.id), Some(BatchStatus::InProgress));
        assert_eq!(store.count_with_status(BatchStatus::InProgress), 1);
    }

    #[test]
    fn test_transition_rejects_regression() {
        let mut store = BatchStatusStore::new();
        let batch = stored(&mut store, "r1", vec![1]);
        store
            .transition(&batch.request_id, &batch.id, BatchStatus::InProgress)
            .unwrap();
        store.transition(&batch.request_id, &batch.id, BatchStatus::Done).unwrap();

        let err = store
            .transition(&batch.request_id, &batch.id, BatchStatus::NotStarted)
            .unwrap_err();
        assert!(matches!(err, IngestError::Transition(_)));
        assert_eq!(store.status(&batch.request_id, &batch.id), Some(BatchStatus::Done));
    }

    #[test]
    fn test_transition_unknown_batch() {
        let mut store = BatchStatusStore::new();
        let err = store
            .transition(&RequestId::from("r"), &BatchId::from("b"), BatchStatus::InProgress)
            .unwrap_err();
        assert!(matches!(err, IngestError::UnknownBatch { .. }));
    }
}
