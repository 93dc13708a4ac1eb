//! The surrounding controller, as seen by the web service.
//!
//! Relay control, button handling, the LCD and the power sensors all live in
//! the host's control loop. The web service only reads snapshots from it and
//! hands it button presses and LED changes.

use chrono::NaiveDateTime;
use tokio::time::Instant;

pub const DISPLAY_ROWS: usize = 4;
pub const DISPLAY_COLS: usize = 20;

/// Number of front-panel buttons reachable from the status page.
pub const NUM_BUTTONS: usize = 7;

/// LCD character codes for the arrow glyphs.
pub const GLYPH_DOWN_ARROW: char = '\x01';
pub const GLYPH_UP_ARROW: char = '\x02';
pub const GLYPH_RIGHT_ARROW: char = '\x7e';
pub const GLYPH_LEFT_ARROW: char = '\x7f';

/// Copy of the LCD contents, one string per row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplaySnapshot {
    pub rows: [String; DISPLAY_ROWS],
}

impl DisplaySnapshot {
    pub fn from_rows(rows: [&str; DISPLAY_ROWS]) -> Self {
        Self {
            rows: rows.map(|r| r.chars().take(DISPLAY_COLS).collect()),
        }
    }
}

/// Panel lamps mirrored on the status page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Indicators {
    pub gen_connected: bool,
    pub util_connected: bool,
    pub gen_on: bool,
    pub util_on: bool,
    pub at_home: bool,
}

pub trait Host {
    /// True while either utility or generator power is on and connected.
    fn have_power(&self) -> bool;

    /// When power last came back, if it ever went away.
    fn power_restored_at(&self) -> Option<Instant>;

    fn wall_clock(&self) -> NaiveDateTime;

    fn display(&self) -> DisplaySnapshot;

    fn indicators(&self) -> Indicators;

    /// Queue a front-panel button press for the control loop.
    fn push_button(&mut self, index: usize);

    fn fatal_error(&self) -> Option<String>;

    fn set_link_led(&mut self, on: bool);

    /// Takes the pending notification payload, clearing the trigger.
    fn take_notification(&mut self) -> Option<String>;
}
