//! Client for a running ingestd server
//!
//! Used by the CLI `submit`, `status`, `stats` and `ping` commands.

use std::time::Duration;

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use super::MAX_MESSAGE_SIZE;
use super::messages::{ClientMessage, ServerResponse};
use crate::domain::{Priority, RequestId, RequestStatus};
use crate::scheduler::QueueState;

/// Default timeout for client operations
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the line protocol
#[derive(Debug, Clone)]
pub struct IngestClient {
    addr: String,
    timeout: Duration,
}

impl IngestClient {
    /// Create a client for `host:port`
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set a custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Submit item IDs; returns the ingestion id
    pub async fn ingest(&self, ids: Vec<i64>, priority: Priority) -> Result<RequestId> {
        debug!(count = ids.len(), ?priority, "IngestClient: ingest");
        match self.send_message(ClientMessage::Ingest { ids, priority }).await? {
            ServerResponse::Ingested { ingestion_id } => Ok(ingestion_id),
            other => Err(unexpected(other)),
        }
    }

    /// Fetch the status of a request
    pub async fn status(&self, ingestion_id: &RequestId) -> Result<RequestStatus> {
        debug!(%ingestion_id, "IngestClient: status");
        let msg = ClientMessage::Status {
            ingestion_id: ingestion_id.clone(),
        };
        match self.send_message(msg).await? {
            ServerResponse::Status(status) => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    /// Fetch scheduler counters
    pub async fn stats(&self) -> Result<QueueState> {
        match self.send_message(ClientMessage::Stats).await? {
            ServerResponse::Stats(state) => Ok(state),
            other => Err(unexpected(other)),
        }
    }

    /// Check if the server is alive and get its version
    pub async fn ping(&self) -> Result<String> {
        debug!("IngestClient: ping");
        match self.send_message(ClientMessage::Ping).await? {
            ServerResponse::Pong { version } => Ok(version),
            other => Err(unexpected(other)),
        }
    }

    /// Send a message to the server and wait for response
    async fn send_message(&self, msg: ClientMessage) -> Result<ServerResponse> {
        debug!(addr = %self.addr, ?msg, "IngestClient: sending message");

        let msg_json = serde_json::to_string(&msg).context("Failed to serialize message")?;
        if msg_json.len() > MAX_MESSAGE_SIZE {
            return Err(eyre::eyre!("Message too large: {} bytes", msg_json.len()));
        }

        let mut stream = tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr))
            .await
            .context("Connection timeout")?
            .context(format!("Failed to connect to ingestd at {}", self.addr))?;

        tokio::time::timeout(self.timeout, async {
            stream
                .write_all(msg_json.as_bytes())
                .await
                .context("Failed to write message")?;
            stream.write_all(b"\n").await.context("Failed to write newline")?;
            stream.flush().await.context("Failed to flush stream")?;

            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).await.context("Failed to read response")?;
            if line.trim().is_empty() {
                return Err(eyre::eyre!("Server closed connection without a response"));
            }
            let response: ServerResponse = serde_json::from_str(line.trim()).context("Failed to parse response")?;
            debug!(?response, "IngestClient: received response");
            Ok(response)
        })
        .await
        .context("Response timeout")?
    }
}

fn unexpected(response: ServerResponse) -> eyre::Report {
    match response {
        ServerResponse::Error { kind, message } => eyre::eyre!("Server error ({:?}): {}", kind, message),
        other => eyre::eyre!("Unexpected response: {:?}", other),
    }
}
