//! Server side of the line protocol
//!
//! One request line and one response line per connection.

use std::sync::Arc;

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::MAX_MESSAGE_SIZE;
use super::messages::{ClientMessage, ErrorKind, ServerResponse};
use crate::scheduler::Scheduler;

/// Bind the TCP listener
pub async fn create_listener(addr: &str) -> Result<TcpListener> {
    debug!(%addr, "create_listener: binding");
    let listener = TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind listener on {}", addr))?;
    Ok(listener)
}

/// Accept connections until a shutdown signal arrives
///
/// Each connection is handled on its own task.
pub async fn serve(listener: TcpListener, scheduler: Arc<Scheduler>, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
    let local = listener.local_addr().context("Listener has no local address")?;
    info!(%local, "Listening for ingestion requests");

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((mut stream, peer)) => {
                        debug!(%peer, "serve: connection accepted");
                        let scheduler = scheduler.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(&mut stream, &scheduler).await {
                                warn!(%peer, error = %e, "Connection error");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "serve: accept error");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                debug!("serve: shutdown signal received");
                break;
            }
        }
    }

    info!("Listener stopped");
    Ok(())
}

/// Read one message, answer it, and return
pub async fn handle_connection<S>(stream: &mut S, scheduler: &Scheduler) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let response = match read_message(stream).await {
        Ok(msg) => dispatch(msg, scheduler).await,
        Err(e) => {
            debug!(error = %e, "handle_connection: unreadable message");
            ServerResponse::Error {
                kind: ErrorKind::BadRequest,
                message: e.to_string(),
            }
        }
    };
    send_response(stream, &response).await
}

/// Run a message against the scheduler
pub async fn dispatch(msg: ClientMessage, scheduler: &Scheduler) -> ServerResponse {
    match msg {
        ClientMessage::Ingest { ids, priority } => match scheduler.submit(ids, priority).await {
            Ok(ingestion_id) => ServerResponse::Ingested { ingestion_id },
            Err(e) => e.into(),
        },
        ClientMessage::Status { ingestion_id } => match scheduler.get_status(&ingestion_id).await {
            Ok(status) => ServerResponse::Status(status),
            Err(e) => e.into(),
        },
        ClientMessage::Stats => ServerResponse::Stats(scheduler.queue_state().await),
        ClientMessage::Ping => ServerResponse::Pong {
            version: env!("GIT_DESCRIBE").to_string(),
        },
    }
}

/// Read a single newline-terminated JSON message
pub async fn read_message<S>(stream: &mut S) -> Result<ClientMessage>
where
    S: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream.take(MAX_MESSAGE_SIZE as u64 + 1));
    let mut line = String::new();

    let bytes_read = reader.read_line(&mut line).await.context("Failed to read message")?;

    if bytes_read > MAX_MESSAGE_SIZE {
        return Err(eyre::eyre!("Message too large: more than {} bytes", MAX_MESSAGE_SIZE));
    }

    if line.trim().is_empty() {
        return Err(eyre::eyre!("Empty message received"));
    }

    let msg: ClientMessage = serde_json::from_str(line.trim()).context("Failed to parse message")?;
    debug!(?msg, "read_message: parsed message");

    Ok(msg)
}

/// Send a response on the stream
pub async fn send_response<S>(stream: &mut S, response: &ServerResponse) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let response_json = serde_json::to_string(response).context("Failed to serialize response")?;
    stream
        .write_all(response_json.as_bytes())
        .await
        .context("Failed to write response")?;
    stream.write_all(b"\n").await.context("Failed to write newline")?;
    stream.flush().await.context("Failed to flush response")?;
    debug!(?response, "send_response: sent response");
    Ok(())
}
