//! Status views returned by lookups

use serde::{Deserialize, Serialize};

use super::batch::{Batch, BatchStatus};
use super::id::{BatchId, RequestId};

/// Overall status of a request, derived from its batches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateStatus {
    NotStarted,
    InProgress,
    Done,
    Failed,
}

impl AggregateStatus {
    /// Derive the aggregate from batch statuses
    ///
    /// - `Done` iff every batch is done
    /// - `NotStarted` iff every batch is not started
    /// - `Failed` iff every batch is terminal and at least one failed
    /// - `InProgress` otherwise, including a mix of done and not-started
    pub fn derive<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = BatchStatus>,
    {
        let mut total = 0usize;
        let mut not_started = 0usize;
        let mut done = 0usize;
        let mut failed = 0usize;

        for status in statuses {
            total += 1;
            match status {
                BatchStatus::NotStarted => not_started += 1,
                BatchStatus::Done => done += 1,
                BatchStatus::Failed => failed += 1,
                BatchStatus::InProgress => {}
            }
        }

        if done == total {
            Self::Done
        } else if not_started == total {
            Self::NotStarted
        } else if failed > 0 && done + failed == total {
            Self::Failed
        } else {
            Self::InProgress
        }
    }

    /// Whether nothing under the request can change anymore
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for AggregateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One batch as seen by a status lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: BatchId,
    pub ids: Vec<i64>,
    pub status: BatchStatus,
}

impl From<&Batch> for BatchSummary {
    fn from(batch: &Batch) -> Self {
        Self {
            batch_id: batch.id.clone(),
            ids: batch.items.clone(),
            status: batch.status,
        }
    }
}

/// Result of `get_status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStatus {
    pub ingestion_id: RequestId,
    pub status: AggregateStatus,
    pub batches: Vec<BatchSummary>,
}

impl RequestStatus {
    /// Build a status view from the request's batches, in batch order
    pub fn from_batches(ingestion_id: RequestId, batches: &[Batch]) -> Self {
        let status = AggregateStatus::derive(batches.iter().map(|b| b.status));
        Self {
            ingestion_id,
            status,
            batches: batches.iter().map(BatchSummary::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BatchStatus::*;

    #[test]
    fn test_all_done_is_done() {
        assert_eq!(AggregateStatus::derive([Done, Done]), AggregateStatus::Done);
    }

    #[test]
    fn test_all_not_started_is_not_started() {
        assert_eq!(
            AggregateStatus::derive([NotStarted, NotStarted, NotStarted]),
            AggregateStatus::NotStarted
        );
    }

    #[test]
    fn test_mixed_is_in_progress() {
        assert_eq!(AggregateStatus::derive([Done, NotStarted]), AggregateStatus::InProgress);
        assert_eq!(AggregateStatus::derive([InProgress, NotStarted]), AggregateStatus::InProgress);
        assert_eq!(AggregateStatus::derive([Done, InProgress]), AggregateStatus::InProgress);
    }

    #[test]
    fn test_failed_only_when_everything_settled() {
        assert_eq!(AggregateStatus::derive([Done, Failed]), AggregateStatus::Failed);
        assert_eq!(AggregateStatus::derive([Failed]), AggregateStatus::Failed);
        assert_eq!(AggregateStatus::derive([Failed, NotStarted]), AggregateStatus::InProgress);
    }

    #[test]
    fn test_request_status_preserves_batch_order() {
        let request_id = RequestId::from("req");
        let mut first = Batch::new(request_id.clone(), vec![1, 2, 3]);
        first.status = Done;
        let second = Batch::new(request_id.clone(), vec![4]);

        let status = RequestStatus::from_batches(request_id, &[first.clone(), second.clone()]);
        assert_eq!(status.status, AggregateStatus::InProgress);
        assert_eq!(status.batches[0].batch_id, first.id);
        assert_eq!(status.batches[0].ids, vec![1, 2, 3]);
        assert_eq!(status.batches[1].status, NotStarted);
    }

    #[test]
    fn test_request_status_json_shape() {
        let request_id = RequestId::from("req");
        let batch = Batch::new(request_id.clone(), vec![7]);
        let json = serde_json::to_value(RequestStatus::from_batches(request_id, &[batch])).unwrap();

        assert_eq!(json["ingestion_id"], "req");
        assert_eq!(json["status"], "not_started");
        assert_eq!(json["batches"][0]["ids"][0], 7);
        assert_eq!(json["batches"][0]["status"], "not_started");
    }
}
