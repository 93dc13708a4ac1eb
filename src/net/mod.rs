//! Network radio and socket primitives.
//!
//! These traits describe a radio module that joins one wireless network,
//! listens on one port, and hands out one client connection at a time. Every
//! call may take a long time once awaited and runs to completion; the
//! connectivity state machine is written so that it awaits them one at a
//! time from a single place.

pub mod tcp;

use std::net::IpAddr;

use crate::config::StaticIp;

pub use tcp::{TcpClient, TcpRadio};

/// Association status reported by the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Association still in progress.
    Idle,
    Connected,
    NoNetwork,
    ConnectFailed,
    ConnectionLost,
    Disconnected,
    NoModule,
}

#[allow(async_fn_in_trait)]
pub trait Radio {
    type Client: ClientConnection;

    /// Applies fixed addressing before the next association.
    async fn configure_static(&mut self, ip: &StaticIp);

    /// Starts joining the network. May block for a long time.
    async fn begin(&mut self, ssid: &str, password: &str) -> LinkStatus;

    async fn status(&mut self) -> LinkStatus;

    /// Hardware reset of the radio module.
    async fn reset(&mut self);

    async fn start_server(&mut self, port: u16) -> anyhow::Result<()>;

    /// Returns a client with pending input, without waiting for one.
    async fn accept(&mut self) -> Option<Self::Client>;

    /// Opens an outbound connection.
    async fn connect(&mut self, host: &str, port: u16) -> Option<Self::Client>;
}

#[allow(async_fn_in_trait)]
pub trait ClientConnection {
    fn peer_addr(&self) -> IpAddr;

    /// True while the peer is connected or unread input remains.
    fn connected(&self) -> bool;

    /// Bytes that can be read without waiting.
    async fn available(&mut self) -> usize;

    /// Reads one byte, waiting at most the read timeout.
    async fn read_byte(&mut self) -> Option<u8>;

    /// Writes some prefix of `buf`; 0 means the write failed.
    async fn write(&mut self, buf: &[u8]) -> usize;

    async fn stop(&mut self);
}
