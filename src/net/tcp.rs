//! Radio implementation over host TCP sockets.
//!
//! The operating system owns the network link here, so association always
//! succeeds and a module reset only drops the listening socket.

use std::future::poll_fn;
use std::net::{IpAddr, SocketAddr};
use std::task::Poll;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::StaticIp;
use crate::net::{ClientConnection, LinkStatus, Radio};

const BUFFER_SIZE: usize = 1024;

pub struct TcpRadio {
    bind_addr: IpAddr,
    listener: Option<TcpListener>,
    read_timeout: Duration,
    connect_timeout: Duration,
}

impl TcpRadio {
    pub fn new(bind_addr: IpAddr, read_timeout: Duration, connect_timeout: Duration) -> Self {
        Self {
            bind_addr,
            listener: None,
            read_timeout,
            connect_timeout,
        }
    }

    /// The address the server is listening on, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }
}

impl Radio for TcpRadio {
    type Client = TcpClient;

    async fn configure_static(&mut self, ip: &StaticIp) {
        debug!(address = %ip.address, "Static addressing is managed by the host OS");
    }

    async fn begin(&mut self, ssid: &str, _password: &str) -> LinkStatus {
        debug!(ssid, "Host network already associated");
        LinkStatus::Connected
    }

    async fn status(&mut self) -> LinkStatus {
        LinkStatus::Connected
    }

    async fn reset(&mut self) {
        info!("Dropping listening socket");
        self.listener = None;
    }

    async fn start_server(&mut self, port: u16) -> anyhow::Result<()> {
        let listener = TcpListener::bind((self.bind_addr, port)).await?;
        info!("Listening on {}", listener.local_addr()?);
        self.listener = Some(listener);
        Ok(())
    }

    async fn accept(&mut self) -> Option<TcpClient> {
        let listener = self.listener.as_ref()?;
        let accepted = poll_fn(|cx| match listener.poll_accept(cx) {
            Poll::Ready(result) => Poll::Ready(Some(result)),
            Poll::Pending => Poll::Ready(None),
        })
        .await?;

        match accepted {
            Ok((stream, peer)) => {
                debug!("Accepted connection from {}", peer);
                Some(TcpClient::new(stream, peer, self.read_timeout))
            }
            Err(e) => {
                warn!(error = %e, "Accept failed");
                None
            }
        }
    }

    async fn connect(&mut self, host: &str, port: u16) -> Option<TcpClient> {
        match timeout(self.connect_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => {
                let peer = stream.peer_addr().ok()?;
                Some(TcpClient::new(stream, peer, self.read_timeout))
            }
            Ok(Err(e)) => {
                warn!(host, port, error = %e, "Outbound connect failed");
                None
            }
            Err(_) => {
                warn!(host, port, "Outbound connect timed out");
                None
            }
        }
    }
}

pub struct TcpClient {
    stream: TcpStream,
    peer: SocketAddr,
    rx: BytesMut,
    open: bool,
    read_timeout: Duration,
}

impl TcpClient {
    fn new(stream: TcpStream, peer: SocketAddr, read_timeout: Duration) -> Self {
        Self {
            stream,
            peer,
            rx: BytesMut::with_capacity(BUFFER_SIZE),
            open: true,
            read_timeout,
        }
    }

    fn fill_nonblocking(&mut self) {
        while self.open {
            self.rx.reserve(BUFFER_SIZE);
            match self.stream.try_read_buf(&mut self.rx) {
                Ok(0) => self.open = false,
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(_) => self.open = false,
            }
        }
    }
}

impl ClientConnection for TcpClient {
    fn peer_addr(&self) -> IpAddr {
        self.peer.ip()
    }

    fn connected(&self) -> bool {
        self.open || !self.rx.is_empty()
    }

    async fn available(&mut self) -> usize {
        self.fill_nonblocking();
        self.rx.len()
    }

    async fn read_byte(&mut self) -> Option<u8> {
        if self.rx.is_empty() {
            if !self.open {
                return None;
            }
            self.rx.reserve(BUFFER_SIZE);
            match timeout(self.read_timeout, self.stream.read_buf(&mut self.rx)).await {
                Ok(Ok(0)) | Ok(Err(_)) => {
                    self.open = false;
                    return None;
                }
                Ok(Ok(_)) => {}
                Err(_) => return None,
            }
        }
        Some(self.rx.get_u8())
    }

    async fn write(&mut self, buf: &[u8]) -> usize {
        if !self.open {
            return 0;
        }
        match self.stream.write(buf).await {
            Ok(n) => n,
            Err(e) => {
                debug!(peer = %self.peer, error = %e, "Write failed");
                self.open = false;
                0
            }
        }
    }

    async fn stop(&mut self) {
        let _ = self.stream.shutdown().await;
        self.open = false;
        self.rx.clear();
    }
}
