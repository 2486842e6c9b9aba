//! Line-protocol adapter over TCP
//!
//! A thin transport around the scheduler's submit / status operations: the
//! client writes one JSON line, the server answers with one JSON line and
//! closes the connection.

pub mod client;
pub mod listener;
pub mod messages;

pub use client::IngestClient;
pub use listener::{create_listener, dispatch, handle_connection, read_message, send_response, serve};
pub use messages::{ClientMessage, ErrorKind, ServerResponse};

/// Maximum message size in bytes
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;
