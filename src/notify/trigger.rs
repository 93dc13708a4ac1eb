//! Webhook trigger delivery.

use std::time::Duration;

use anyhow::Context;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::NotifyConfig;
use crate::eventlog::{EventKind, EventLog};
use crate::host::Host;
use crate::http::writer::{ChunkedWriter, WriteError};
use crate::net::{ClientConnection, Radio};

const DRAIN_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// Could not open a connection to the webhook host.
    Connect,
    /// The connection dropped while the request was going out.
    Write(WriteError),
}

/// Sends `{"value1": <payload>}` to the configured webhook over a fresh
/// connection, reads and discards the reply, and closes.
#[derive(Debug, Clone)]
pub struct TriggerSender {
    host: String,
    port: u16,
    path: String,
    writer: ChunkedWriter,
    drain_timeout: Duration,
}

impl TriggerSender {
    pub fn new(
        cfg: &NotifyConfig,
        writer: ChunkedWriter,
        drain_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut url = url::Url::parse(&format!("http://{}:{}/", cfg.host, cfg.port))
            .context("Invalid notification endpoint")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Notification endpoint cannot take a path"))?
            .clear()
            .extend(["trigger", cfg.event.as_str(), "with", "key", cfg.key.as_str()]);

        let host = url
            .host_str()
            .context("Notification endpoint missing host")?
            .to_string();
        let port = url.port_or_known_default().unwrap_or(80);

        Ok(Self {
            host,
            port,
            path: url.path().to_string(),
            writer,
            drain_timeout,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Build the trigger request bytes.
    pub fn build_request(&self, payload: &str) -> Vec<u8> {
        let body = serde_json::json!({ "value1": payload }).to_string();

        let mut buffer = Vec::with_capacity(body.len() + 256);
        buffer.extend_from_slice(format!("POST {} HTTP/1.1\r\n", self.path).as_bytes());
        buffer.extend_from_slice(format!("Host: {}\r\n", self.host).as_bytes());
        buffer.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
        buffer.extend_from_slice(b"Content-Type: application/json; charset=\"UTF-8\"\r\n");
        buffer.extend_from_slice(b"Connection: close\r\n");
        buffer.extend_from_slice(b"\r\n");
        buffer.extend_from_slice(body.as_bytes());
        buffer
    }

    /// One delivery attempt. Failures are logged and returned, never retried
    /// here.
    pub async fn send<R: Radio, H: Host>(
        &self,
        radio: &mut R,
        host: &H,
        log: &mut EventLog,
        payload: &str,
    ) -> Result<(), SendError> {
        log.append(host.wall_clock(), EventKind::IftttSending, None, Some(payload));
        debug!(payload, host = %self.host, "Sending trigger");

        let Some(mut client) = radio.connect(&self.host, self.port).await else {
            warn!(host = %self.host, port = self.port, "Failed to connect to trigger host");
            log.append(host.wall_clock(), EventKind::IftttFailed, None, None);
            return Err(SendError::Connect);
        };

        let request = self.build_request(payload);
        if let Err(e) = self.writer.write_all(&mut client, &request).await {
            warn!(error = ?e, "Trigger request aborted");
            client.stop().await;
            log.append(host.wall_clock(), EventKind::IftttFailed, None, None);
            return Err(SendError::Write(e));
        }

        let drained = timeout(self.drain_timeout, drain(&mut client)).await;
        match drained {
            Ok(bytes) => debug!(bytes, "Trigger response drained"),
            Err(_) => debug!("Trigger response still open at drain timeout"),
        }
        client.stop().await;

        info!(payload, "Trigger sent");
        log.append(host.wall_clock(), EventKind::IftttSent, None, None);
        Ok(())
    }
}

async fn drain<C: ClientConnection>(client: &mut C) -> usize {
    let mut bytes = 0;
    while client.connected() {
        match client.read_byte().await {
            Some(_) => bytes += 1,
            None => tokio::time::sleep(DRAIN_POLL).await,
        }
    }
    bytes
}
