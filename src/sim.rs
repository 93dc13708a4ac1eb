//! Scripted stand-ins for the radio, its clients, and the host controller.
//!
//! Each type is a cheap handle over shared state, so a test can keep a clone
//! for inspection after handing another clone to the controller.

use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDateTime;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::config::StaticIp;
use crate::host::{DisplaySnapshot, Host, Indicators};
use crate::net::{ClientConnection, LinkStatus, Radio};

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct ClientState {
    input: VecDeque<u8>,
    output: Vec<u8>,
    open: bool,
    stopped: bool,
    hang_up_when_drained: bool,
    write_budget: Option<usize>,
}

/// A client connection fed from a fixed input buffer.
///
/// Reading past the end of the input behaves like a read timeout: the
/// connection stays open unless [`hang_up_when_drained`] was set.
///
/// [`hang_up_when_drained`]: SimClient::hang_up_when_drained
#[derive(Debug, Clone)]
pub struct SimClient {
    peer: IpAddr,
    state: Arc<Mutex<ClientState>>,
}

impl SimClient {
    pub fn new(peer: IpAddr, input: impl AsRef<[u8]>) -> Self {
        Self {
            peer,
            state: Arc::new(Mutex::new(ClientState {
                input: input.as_ref().iter().copied().collect(),
                open: true,
                ..ClientState::default()
            })),
        }
    }

    /// The peer closes its side once all input has been read.
    pub fn hang_up_when_drained(self) -> Self {
        locked(&self.state).hang_up_when_drained = true;
        self
    }

    /// The peer disconnects after accepting `bytes` of output.
    pub fn disconnect_after(self, bytes: usize) -> Self {
        locked(&self.state).write_budget = Some(bytes);
        self
    }

    pub fn output(&self) -> Vec<u8> {
        locked(&self.state).output.clone()
    }

    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output()).into_owned()
    }

    pub fn remaining_input(&self) -> usize {
        locked(&self.state).input.len()
    }

    /// Whether the server side closed the connection.
    pub fn is_stopped(&self) -> bool {
        locked(&self.state).stopped
    }
}

impl ClientConnection for SimClient {
    fn peer_addr(&self) -> IpAddr {
        self.peer
    }

    fn connected(&self) -> bool {
        let state = locked(&self.state);
        state.open || !state.input.is_empty()
    }

    async fn available(&mut self) -> usize {
        locked(&self.state).input.len()
    }

    async fn read_byte(&mut self) -> Option<u8> {
        let mut state = locked(&self.state);
        let byte = state.input.pop_front();
        if byte.is_none() && state.hang_up_when_drained {
            state.open = false;
        }
        byte
    }

    async fn write(&mut self, buf: &[u8]) -> usize {
        let mut state = locked(&self.state);
        if !state.open {
            return 0;
        }
        let n = match state.write_budget {
            Some(budget) => buf.len().min(budget),
            None => buf.len(),
        };
        if n == 0 {
            state.open = false;
            return 0;
        }
        if let Some(budget) = state.write_budget.as_mut() {
            *budget -= n;
        }
        state.output.extend_from_slice(&buf[..n]);
        n
    }

    async fn stop(&mut self) {
        let mut state = locked(&self.state);
        state.open = false;
        state.stopped = true;
        state.input.clear();
    }
}

#[derive(Debug)]
struct RadioState {
    statuses: VecDeque<LinkStatus>,
    fallback: LinkStatus,
    incoming: VecDeque<SimClient>,
    outbound: VecDeque<Option<SimClient>>,
    begin_gate: Option<Arc<Notify>>,
    begin_calls: u32,
    resets: u32,
    static_configs: u32,
    servers_started: Vec<u16>,
    connects: Vec<(String, u16)>,
}

/// A radio whose status replies follow a script.
#[derive(Debug, Clone)]
pub struct SimRadio {
    state: Arc<Mutex<RadioState>>,
}

impl Default for SimRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRadio {
    /// A radio that reports `Connected` whenever the script is empty.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RadioState {
                statuses: VecDeque::new(),
                fallback: LinkStatus::Connected,
                incoming: VecDeque::new(),
                outbound: VecDeque::new(),
                begin_gate: None,
                begin_calls: 0,
                resets: 0,
                static_configs: 0,
                servers_started: Vec::new(),
                connects: Vec::new(),
            })),
        }
    }

    /// Status replied once the script runs out.
    pub fn set_fallback(&self, status: LinkStatus) {
        locked(&self.state).fallback = status;
    }

    pub fn script_status(&self, statuses: impl IntoIterator<Item = LinkStatus>) {
        locked(&self.state).statuses.extend(statuses);
    }

    pub fn push_client(&self, client: SimClient) {
        locked(&self.state).incoming.push_back(client);
    }

    /// Result of the next outbound connect; `None` refuses it.
    pub fn push_outbound(&self, client: Option<SimClient>) {
        locked(&self.state).outbound.push_back(client);
    }

    /// Makes `begin` wait until the returned handle is notified.
    pub fn block_begin(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        locked(&self.state).begin_gate = Some(gate.clone());
        gate
    }

    pub fn begin_calls(&self) -> u32 {
        locked(&self.state).begin_calls
    }

    pub fn resets(&self) -> u32 {
        locked(&self.state).resets
    }

    pub fn static_configs(&self) -> u32 {
        locked(&self.state).static_configs
    }

    pub fn servers_started(&self) -> Vec<u16> {
        locked(&self.state).servers_started.clone()
    }

    pub fn connects(&self) -> Vec<(String, u16)> {
        locked(&self.state).connects.clone()
    }
}

impl Radio for SimRadio {
    type Client = SimClient;

    async fn configure_static(&mut self, _ip: &StaticIp) {
        locked(&self.state).static_configs += 1;
    }

    async fn begin(&mut self, _ssid: &str, _password: &str) -> LinkStatus {
        let gate = {
            let mut state = locked(&self.state);
            state.begin_calls += 1;
            state.begin_gate.take()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        LinkStatus::Idle
    }

    async fn status(&mut self) -> LinkStatus {
        let mut state = locked(&self.state);
        let fallback = state.fallback;
        state.statuses.pop_front().unwrap_or(fallback)
    }

    async fn reset(&mut self) {
        locked(&self.state).resets += 1;
    }

    async fn start_server(&mut self, port: u16) -> anyhow::Result<()> {
        locked(&self.state).servers_started.push(port);
        Ok(())
    }

    async fn accept(&mut self) -> Option<SimClient> {
        locked(&self.state).incoming.pop_front()
    }

    async fn connect(&mut self, host: &str, port: u16) -> Option<SimClient> {
        let mut state = locked(&self.state);
        state.connects.push((host.to_string(), port));
        state.outbound.pop_front().flatten()
    }
}

#[derive(Debug, Clone)]
pub struct HostState {
    pub power: bool,
    pub power_restored_at: Option<Instant>,
    /// Fixed wall clock; `None` reads the local time.
    pub clock: Option<NaiveDateTime>,
    pub display: DisplaySnapshot,
    pub indicators: Indicators,
    pub pressed: Vec<usize>,
    pub fatal: Option<String>,
    pub link_led: bool,
    pub notification: Option<String>,
}

/// A host controller with settable panel state.
#[derive(Debug, Clone)]
pub struct SimHost {
    state: Arc<Mutex<HostState>>,
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHost {
    /// Powered, with a blank display and all lamps off.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HostState {
                power: true,
                power_restored_at: None,
                clock: None,
                display: DisplaySnapshot::default(),
                indicators: Indicators::default(),
                pressed: Vec::new(),
                fatal: None,
                link_led: false,
                notification: None,
            })),
        }
    }

    /// Applies `f` to the shared state.
    pub fn update(&self, f: impl FnOnce(&mut HostState)) {
        f(&mut *locked(&self.state));
    }

    pub fn snapshot(&self) -> HostState {
        locked(&self.state).clone()
    }

    pub fn set_display(&self, rows: [&str; 4]) {
        locked(&self.state).display = DisplaySnapshot::from_rows(rows);
    }

    /// Raises the notification trigger with `payload`.
    pub fn trigger(&self, payload: &str) {
        locked(&self.state).notification = Some(payload.to_string());
    }

    pub fn pressed(&self) -> Vec<usize> {
        locked(&self.state).pressed.clone()
    }

    pub fn link_led(&self) -> bool {
        locked(&self.state).link_led
    }
}

impl Host for SimHost {
    fn have_power(&self) -> bool {
        locked(&self.state).power
    }

    fn power_restored_at(&self) -> Option<Instant> {
        locked(&self.state).power_restored_at
    }

    fn wall_clock(&self) -> NaiveDateTime {
        locked(&self.state)
            .clock
            .unwrap_or_else(|| chrono::Local::now().naive_local())
    }

    fn display(&self) -> DisplaySnapshot {
        locked(&self.state).display.clone()
    }

    fn indicators(&self) -> Indicators {
        locked(&self.state).indicators
    }

    fn push_button(&mut self, index: usize) {
        locked(&self.state).pressed.push(index);
    }

    fn fatal_error(&self) -> Option<String> {
        locked(&self.state).fatal.clone()
    }

    fn set_link_led(&mut self, on: bool) {
        locked(&self.state).link_led = on;
    }

    fn take_notification(&mut self) -> Option<String> {
        locked(&self.state).notification.take()
    }
}
