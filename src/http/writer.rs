use std::time::Duration;

use tracing::{debug, trace};

use crate::http::response::Response;
use crate::net::ClientConnection;

const STATUS_LINE: &str = "HTTP/1.1 200 OK\r\n";

/// Why a write stopped before the whole buffer went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteError {
    /// The peer was gone before a chunk could be written.
    Disconnected { written: usize },
    /// The transport accepted zero bytes.
    Stalled { written: usize },
}

pub fn serialize_response(resp: &Response) -> Vec<u8> {
    let mut buf = Vec::with_capacity(resp.body.len() + 128);

    buf.extend_from_slice(STATUS_LINE.as_bytes());

    for (k, v) in &resp.headers {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf.extend_from_slice(&resp.body);

    buf
}

/// Writes in bounded chunks with a pause after each one, checking the
/// connection before every chunk. The radio drops data on long writes.
#[derive(Debug, Clone, Copy)]
pub struct ChunkedWriter {
    chunk_size: usize,
    pause: Duration,
}

impl ChunkedWriter {
    pub fn new(chunk_size: usize, pause: Duration) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            pause,
        }
    }

    pub async fn write_all<C: ClientConnection>(
        &self,
        client: &mut C,
        buf: &[u8],
    ) -> Result<(), WriteError> {
        let mut written = 0;
        while written < buf.len() {
            if !client.connected() {
                return Err(WriteError::Disconnected { written });
            }
            let end = (written + self.chunk_size).min(buf.len());
            let n = client.write(&buf[written..end]).await;
            if n == 0 {
                return Err(WriteError::Stalled { written });
            }
            written += n;
            trace!(bytes = n, total = written, "Wrote chunk");
            tokio::time::sleep(self.pause).await;
        }
        Ok(())
    }
}

/// Sends one response, then empties the input and closes the connection.
///
/// A failed write abandons the rest of the response; it is never retried.
pub async fn send_response<C: ClientConnection>(
    client: &mut C,
    response: &Response,
    writer: &ChunkedWriter,
    pause: Duration,
) -> Result<(), WriteError> {
    let result = writer
        .write_all(client, &serialize_response(response))
        .await;
    if let Err(e) = &result {
        debug!(kind = response.kind.name(), error = ?e, "Response aborted");
    }
    tokio::time::sleep(pause).await;
    close_connection(client).await;
    result
}

/// Discards unread input and closes the connection from our side.
pub async fn close_connection<C: ClientConnection>(client: &mut C) {
    let mut drained = 0usize;
    while client.connected() && client.available().await > 0 {
        if client.read_byte().await.is_none() {
            break;
        }
        drained += 1;
    }
    if drained > 0 {
        trace!(bytes = drained, "Drained unread input");
    }
    if client.connected() {
        client.stop().await;
    }
}
