//! Bounded ring of timestamped events.
//!
//! The log keeps the most recent `capacity` entries. Appending to a full
//! ring silently overwrites the oldest entry. Readers walk it newest first.

use chrono::NaiveDateTime;

/// Longest message stored with an entry, in bytes.
pub const LOG_MSG_SIZE: usize = 20;

/// Everything the controller knows how to record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Startup,
    UtilFail,
    PowerBack,
    GenOn,
    GenOnFail,
    GenOff,
    GenOffFail,
    GenCooldown,
    GenConnect,
    GenConnectFail,
    GenConnectBadState,
    UtilConnect,
    UtilConnectFail,
    UtilConnectBadState,
    WifiReset,
    WifiConnected,
    WifiNoConnect,
    WifiDisconnected,
    Assertion,
    WatchdogReset,
    BatteryRead,
    BatteryWeak,
    ConfigUpdated,
    ExerciseStart,
    ExerciseEnd,
    IftttQueued,
    IftttSending,
    IftttSent,
    IftttFailed,
    Misc,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Startup => "startup",
            EventKind::UtilFail => "utility failed",
            EventKind::PowerBack => "power back",
            EventKind::GenOn => "generator on",
            EventKind::GenOnFail => "generator on failed",
            EventKind::GenOff => "generator off",
            EventKind::GenOffFail => "generator off failed",
            EventKind::GenCooldown => "generator cooldown",
            EventKind::GenConnect => "generator connected",
            EventKind::GenConnectFail => "generator connect failed",
            EventKind::GenConnectBadState => "generator connect bad state",
            EventKind::UtilConnect => "utility connected",
            EventKind::UtilConnectFail => "utility connect failed",
            EventKind::UtilConnectBadState => "utility connect bad state",
            EventKind::WifiReset => "WiFi reset",
            EventKind::WifiConnected => "WiFi connected",
            EventKind::WifiNoConnect => "WiFi no connect",
            EventKind::WifiDisconnected => "WiFi disconnected",
            EventKind::Assertion => "assertion failed",
            EventKind::WatchdogReset => "watchdog reset",
            EventKind::BatteryRead => "battery read",
            EventKind::BatteryWeak => "battery weak",
            EventKind::ConfigUpdated => "config updated",
            EventKind::ExerciseStart => "exercise start",
            EventKind::ExerciseEnd => "exercise end",
            EventKind::IftttQueued => "IFTTT queued",
            EventKind::IftttSending => "IFTTT sending",
            EventKind::IftttSent => "IFTTT sent",
            EventKind::IftttFailed => "IFTTT failed",
            EventKind::Misc => "misc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: NaiveDateTime,
    pub kind: EventKind,
    pub aux: Option<i16>,
    /// At most [`LOG_MSG_SIZE`] bytes, cut on a character boundary.
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EventLog {
    slots: Vec<Option<LogEntry>>,
    newest: usize,
    oldest: usize,
    count: usize,
}

impl EventLog {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "event log capacity must be non-zero");
        Self {
            slots: vec![None; capacity],
            newest: capacity - 1,
            oldest: 0,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn newest_index(&self) -> Option<usize> {
        (self.count > 0).then_some(self.newest)
    }

    pub fn oldest_index(&self) -> Option<usize> {
        (self.count > 0).then_some(self.oldest)
    }

    pub fn append(
        &mut self,
        timestamp: NaiveDateTime,
        kind: EventKind,
        aux: Option<i16>,
        message: Option<&str>,
    ) {
        let capacity = self.capacity();
        self.newest = (self.newest + 1) % capacity;
        self.slots[self.newest] = Some(LogEntry {
            timestamp,
            kind,
            aux,
            message: message.map(truncate_message),
        });

        if self.count < capacity {
            self.count += 1;
        } else {
            // The slot just written held the oldest entry.
            self.oldest = (self.oldest + 1) % capacity;
        }
    }

    pub fn iter_newest_first(&self) -> NewestFirst<'_> {
        NewestFirst {
            log: self,
            next: self.newest,
            remaining: self.count,
        }
    }
}

fn truncate_message(msg: &str) -> String {
    if msg.len() <= LOG_MSG_SIZE {
        return msg.to_string();
    }
    let mut end = LOG_MSG_SIZE;
    while !msg.is_char_boundary(end) {
        end -= 1;
    }
    msg[..end].to_string()
}

/// Walks from the newest entry back to the oldest, wrapping at the ring edge.
pub struct NewestFirst<'a> {
    log: &'a EventLog,
    next: usize,
    remaining: usize,
}

impl<'a> Iterator for NewestFirst<'a> {
    type Item = &'a LogEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let entry = self.log.slots[self.next].as_ref();
        self.remaining -= 1;
        self.next = match self.next {
            0 => self.log.capacity() - 1,
            n => n - 1,
        };
        entry
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for NewestFirst<'_> {}
