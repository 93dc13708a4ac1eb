//! Connectivity state machine.
//!
//! ```text
//!   Disconnected ──retry time reached──▶ AwaitingAssociation
//!        ▲                                   │ connected: start server
//!        │ failure (reset after N tries)     ▼
//!        └────────── link lost ◀──── AwaitingClient ◀──┐
//!                                            │ button   │ deadline
//!                                            ▼ push     │ passed
//!                                      ProcessingRequest┘
//! ```
//!
//! Each call to [`Controller::service`] advances the machine by exactly one
//! step. Radio calls are awaited one at a time from here and nowhere else.

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::eventlog::{EventKind, EventLog};
use crate::host::Host;
use crate::http::connection::{Disposition, process_client_request, respond};
use crate::http::parser::LineReader;
use crate::http::response::ResponseKind;
use crate::http::writer::ChunkedWriter;
use crate::net::{ClientConnection, LinkStatus, Radio};
use crate::notify::{NotificationQueue, RetryDecision, TriggerSender};
use crate::server::deferred::PendingResponse;
use crate::visitors::VisitorRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Disconnected,
    AwaitingAssociation,
    AwaitingClient,
    ProcessingRequest,
}

/// Association bookkeeping owned by the state machine.
#[derive(Debug, Clone, Copy)]
pub struct Connectivity {
    pub state: ConnectivityState,
    /// Association attempts since the last success or module reset.
    pub connect_attempts: u32,
    /// Module resets since the last successful association.
    pub consecutive_resets: u32,
    /// No association attempt starts before this time.
    pub next_retry: Instant,
}

/// Lifetime counters shown on the visitors page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectivityStats {
    pub connects: u64,
    pub connect_failures: u64,
    pub disconnects: u64,
    pub resets: u64,
    pub requests_processed: u64,
}

/// What one call to `service` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStep {
    /// A previous call is still in progress; nothing was done.
    Busy,
    /// No power, or power came back too recently to expect a network.
    PowerWait,
    /// Disconnected and waiting for the retry time.
    RetryWait,
    AssociationStarted { attempt: u32 },
    AssociationPending,
    Associated,
    AssociationFailed { attempts: u32, reset: bool },
    LinkLost,
    Idle,
    Responded(ResponseKind),
    Deferred,
    DeferredWaiting,
    DeferredSent,
    NotificationSent,
    NotificationFailed(RetryDecision),
}

/// Everything the web service owns, passed by exclusive reference to each
/// step.
pub struct WebContext<R: Radio, H: Host> {
    pub config: Config,
    pub radio: R,
    pub host: H,
    pub log: EventLog,
    pub visitors: VisitorRegistry,
    pub link: Connectivity,
    pub stats: ConnectivityStats,
    pub pending: PendingResponse,
    pub notifications: NotificationQueue,
    pub(crate) reader: LineReader,
    pub(crate) writer: ChunkedWriter,
    sender: TriggerSender,
    held_client: Option<R::Client>,
}

impl<R: Radio, H: Host> WebContext<R, H> {
    pub fn new(config: Config, radio: R, host: H) -> anyhow::Result<Self> {
        let writer = ChunkedWriter::new(config.limits.chunk_size, config.timing.chunk_pause());
        let sender = TriggerSender::new(&config.notify, writer, config.timing.drain_timeout())?;

        Ok(Self {
            log: EventLog::new(config.limits.log_capacity),
            visitors: VisitorRegistry::new(config.limits.max_visitors),
            link: Connectivity {
                state: ConnectivityState::Disconnected,
                connect_attempts: 0,
                consecutive_resets: 0,
                next_retry: Instant::now(),
            },
            stats: ConnectivityStats::default(),
            pending: PendingResponse::new(),
            notifications: NotificationQueue::new(
                config.notify.max_retries,
                config.notify.retry_delay(),
            ),
            reader: LineReader::new(config.limits.max_line),
            writer,
            sender,
            held_client: None,
            config,
            radio,
            host,
        })
    }

    pub fn state(&self) -> ConnectivityState {
        self.link.state
    }

    pub fn log_event(&mut self, kind: EventKind, aux: Option<i16>, message: Option<&str>) {
        let now = self.host.wall_clock();
        self.log.append(now, kind, aux, message);
    }

    /// Advances the machine by one step.
    pub async fn step(&mut self) -> ServiceStep {
        if !self.host.have_power() {
            return ServiceStep::PowerWait;
        }
        if let Some(restored) = self.host.power_restored_at() {
            if restored.elapsed() < self.config.timing.power_on_web_delay() {
                return ServiceStep::PowerWait;
            }
        }

        if let Some(payload) = self.host.take_notification() {
            self.log_event(EventKind::IftttQueued, None, Some(&payload));
            self.notifications.enqueue(payload, Instant::now());
        }

        match self.link.state {
            ConnectivityState::Disconnected => self.try_associate().await,
            ConnectivityState::AwaitingAssociation => self.poll_association().await,
            ConnectivityState::AwaitingClient => self.poll_client().await,
            ConnectivityState::ProcessingRequest => self.finish_deferred().await,
        }
    }

    async fn try_associate(&mut self) -> ServiceStep {
        self.host.set_link_led(false);
        if Instant::now() < self.link.next_retry {
            return ServiceStep::RetryWait;
        }

        if let Some(ip) = self.config.wifi.static_ip.clone() {
            debug!(address = %ip.address, "Applying static addressing");
            self.radio.configure_static(&ip).await;
        }

        info!(ssid = %self.config.wifi.ssid, "Attempting network association");
        self.host.set_link_led(true);
        let status = self
            .radio
            .begin(&self.config.wifi.ssid, &self.config.wifi.password)
            .await;
        debug!(?status, "Association started");

        self.link.connect_attempts += 1;
        self.link.state = ConnectivityState::AwaitingAssociation;
        ServiceStep::AssociationStarted {
            attempt: self.link.connect_attempts,
        }
    }

    async fn poll_association(&mut self) -> ServiceStep {
        match self.radio.status().await {
            LinkStatus::Connected => {
                if let Err(e) = self.radio.start_server(self.config.wifi.port).await {
                    warn!(error = %e, "Failed to start server");
                    return self.association_failed(LinkStatus::ConnectFailed).await;
                }
                self.stats.connects += 1;
                self.link.connect_attempts = 0;
                self.link.consecutive_resets = 0;
                self.link.state = ConnectivityState::AwaitingClient;
                self.host.set_link_led(true);
                self.log_event(EventKind::WifiConnected, None, None);
                info!(port = self.config.wifi.port, "Associated; server started");
                ServiceStep::Associated
            }
            LinkStatus::Idle => ServiceStep::AssociationPending,
            status => self.association_failed(status).await,
        }
    }

    async fn association_failed(&mut self, status: LinkStatus) -> ServiceStep {
        self.host.set_link_led(false);
        self.stats.connect_failures += 1;
        let attempts = self.link.connect_attempts;
        self.log_event(
            EventKind::WifiNoConnect,
            Some(i16::try_from(attempts).unwrap_or(i16::MAX)),
            None,
        );
        warn!(?status, attempts, "Association failed");

        let reset = attempts >= self.config.timing.max_connect_attempts;
        if reset {
            warn!(attempts, "Too many association attempts; resetting module");
            self.reset_module().await;
        }

        self.link.next_retry = Instant::now() + self.config.timing.connect_delay();
        self.link.state = ConnectivityState::Disconnected;
        ServiceStep::AssociationFailed { attempts, reset }
    }

    async fn reset_module(&mut self) {
        self.stats.resets += 1;
        self.link.consecutive_resets += 1;
        self.link.connect_attempts = 0;
        self.log_event(EventKind::WifiReset, None, None);
        if let Some(mut client) = self.held_client.take() {
            client.stop().await;
        }
        self.pending.disarm();
        self.radio.reset().await;
    }

    async fn poll_client(&mut self) -> ServiceStep {
        if self.radio.status().await != LinkStatus::Connected {
            self.stats.disconnects += 1;
            self.log_event(EventKind::WifiDisconnected, None, None);
            warn!("Dropped from network; resetting module");
            self.host.set_link_led(false);
            self.reset_module().await;
            self.link.next_retry = Instant::now() + self.config.timing.connect_delay();
            self.link.state = ConnectivityState::Disconnected;
            return ServiceStep::LinkLost;
        }

        if let Some(mut client) = self.radio.accept().await {
            self.link.state = ConnectivityState::ProcessingRequest;
            return match process_client_request(self, &mut client).await {
                Disposition::Responded(kind) => {
                    self.link.state = ConnectivityState::AwaitingClient;
                    ServiceStep::Responded(kind)
                }
                Disposition::Deferred => {
                    self.held_client = Some(client);
                    ServiceStep::Deferred
                }
            };
        }

        if self.notifications.due(Instant::now()).is_some() {
            return self.send_notification().await;
        }

        ServiceStep::Idle
    }

    async fn send_notification(&mut self) -> ServiceStep {
        let Some(payload) = self.notifications.pending().map(|r| r.payload.clone()) else {
            return ServiceStep::Idle;
        };
        if let Some(mut prior) = self.held_client.take() {
            prior.stop().await;
        }

        match self
            .sender
            .send(&mut self.radio, &self.host, &mut self.log, &payload)
            .await
        {
            Ok(()) => {
                self.notifications.mark_sent();
                ServiceStep::NotificationSent
            }
            Err(e) => {
                let decision = self.notifications.mark_failed(Instant::now());
                warn!(error = ?e, ?decision, "Notification failed");
                ServiceStep::NotificationFailed(decision)
            }
        }
    }

    async fn finish_deferred(&mut self) -> ServiceStep {
        if !self.pending.is_armed() {
            warn!("Processing a request with no deferred response armed");
            self.log_event(EventKind::Assertion, None, Some("not delayed rsp?"));
            self.held_client = None;
            self.link.state = ConnectivityState::AwaitingClient;
            return ServiceStep::Idle;
        }

        if !self.pending.take_if_due(Instant::now()) {
            return ServiceStep::DeferredWaiting;
        }

        debug!("Sending deferred response to button push");
        if let Some(mut client) = self.held_client.take() {
            respond(self, &mut client, ResponseKind::Status).await;
        }
        self.link.state = ConnectivityState::AwaitingClient;
        ServiceStep::DeferredSent
    }
}

/// Entry point for the host's main loop.
///
/// `service` is guarded against re-entry: a call made while another is still
/// awaiting a radio primitive returns [`ServiceStep::Busy`] without touching
/// any state.
pub struct Controller<R: Radio, H: Host> {
    ctx: Mutex<WebContext<R, H>>,
}

impl<R: Radio, H: Host> Controller<R, H> {
    pub fn new(config: Config, radio: R, host: H) -> anyhow::Result<Self> {
        Ok(Self {
            ctx: Mutex::new(WebContext::new(config, radio, host)?),
        })
    }

    pub async fn service(&self) -> ServiceStep {
        let Ok(mut ctx) = self.ctx.try_lock() else {
            return ServiceStep::Busy;
        };
        ctx.step().await
    }

    /// Runs `f` with exclusive access to the context, waiting for any
    /// in-progress step to finish first.
    pub async fn with_context<T>(&self, f: impl FnOnce(&mut WebContext<R, H>) -> T) -> T {
        let mut ctx = self.ctx.lock().await;
        f(&mut *ctx)
    }
}
