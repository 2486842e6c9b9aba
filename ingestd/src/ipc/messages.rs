//! Line-protocol message types
//!
//! Simple JSON-over-newline protocol. Each message is a single line of JSON followed by `\n`.

use serde::{Deserialize, Serialize};

use crate::domain::{IngestError, Priority, RequestId, RequestStatus};
use crate::scheduler::QueueState;

/// Messages from a client to the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Submit item IDs for ingestion
    Ingest { ids: Vec<i64>, priority: Priority },

    /// Look up an ingestion request
    Status { ingestion_id: RequestId },

    /// Scheduler counters
    Stats,

    /// Ping to check if the server is alive
    Ping,
}

/// Class of a failed request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller input rejected (HTTP 400 equivalent)
    BadRequest,
    /// Unknown ingestion id (HTTP 404 equivalent)
    NotFound,
    /// Anything else
    Internal,
}

/// Responses from the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ServerResponse {
    /// Submission accepted
    Ingested { ingestion_id: RequestId },

    /// Status of one request
    Status(RequestStatus),

    /// Scheduler snapshot
    Stats(QueueState),

    /// Pong response to ping
    Pong { version: String },

    /// Error response
    Error { kind: ErrorKind, message: String },
}

impl From<IngestError> for ServerResponse {
    fn from(err: IngestError) -> Self {
        let kind = if err.is_client_error() {
            ErrorKind::BadRequest
        } else if err.is_not_found() {
            ErrorKind::NotFound
        } else {
            ErrorKind::Internal
        };
        Self::Error {
            kind,
            message: err.to_string(),
        }
    }
}
