//! HTML pages served to the browser.

use std::fmt::Write as _;

use chrono::NaiveDateTime;

use crate::eventlog::EventLog;
use crate::host::{
    DisplaySnapshot, GLYPH_DOWN_ARROW, GLYPH_LEFT_ARROW, GLYPH_RIGHT_ARROW, GLYPH_UP_ARROW,
    Indicators, NUM_BUTTONS,
};
use crate::http::response::ResponseKind;
use crate::server::state::ConnectivityStats;
use crate::visitors::VisitorRegistry;

const OFF_COLOR: &str = "LightGray";
const ON_COLOR: &str = "Gold";

const STYLE_BLOCK: &str = concat!(
    "<!DOCTYPE HTML>\r\n",
    "<html><head><meta http-equiv=\"Content-Type\" content=\"text/html; charset=windows-1252\"><style>\r\n",
    ".lcd {font-family: monospace; font-size:x-large; width:23ch; border:3px; border-style:solid; border-color:blue; border-radius:10px; padding:1em}\r\n",
    ".led{height:20px; width:20px; border-radius:50%; background-color:blue; display:inline-block; position:absolute}\r\n",
    ".button {height:25px; width:25px; border:2px solid red; border-radius:50%; background-color:gray; color:white; display: inline-block; position:absolute;\r\n",
    "  -webkit-transition-duration: 0.2s; transition-duration: 0.2s; cursor: pointer;}\r\n",
    ".button:hover{background-color:red;}\r\n",
    ".container {position: relative; text-align: left; color: white;}\r\n",
    "</style></head><body>\r\n",
);

const CLOSING: &str = "</body></html>\r\n";

/// Lamp positions over the button image, in lamp order of [`Indicators`].
const LED_POSITIONS: [(u32, u32); 5] = [(85, 30), (175, 30), (35, 45), (225, 45), (305, 111)];

const BUTTON_POSITIONS: [(u32, u32); NUM_BUTTONS] = [
    (105, 85),
    (155, 85),
    (32, 150),
    (82, 150),
    (168, 150),
    (222, 150),
    (301, 85),
];

/// Data shared by every page heading.
#[derive(Debug, Clone, Copy)]
pub struct PageHeader<'a> {
    pub title: &'a str,
    pub now: NaiveDateTime,
}

pub fn format_datetime(t: NaiveDateTime) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Replaces the LCD arrow glyphs with HTML arrows and spaces with `&nbsp;`
/// so the mirrored display keeps its column alignment.
pub fn expand_arrows_and_blanks(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            GLYPH_LEFT_ARROW => out.push_str("&#8592;"),
            GLYPH_UP_ARROW => out.push_str("&#8593;"),
            GLYPH_RIGHT_ARROW => out.push_str("&#8594;"),
            GLYPH_DOWN_ARROW => out.push_str("&#8595;"),
            ' ' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
    out
}

fn page(header: &PageHeader<'_>, content: impl FnOnce(&mut String)) -> String {
    let mut html = String::with_capacity(2048);
    html.push_str(STYLE_BLOCK);
    let _ = write!(html, "<h1>{} generator</h1>\r\n", header.title);
    let _ = write!(
        html,
        "<p style=\"font-size:large;\">&nbsp;&nbsp;&nbsp;&nbsp;{}</p><br>\r\n",
        format_datetime(header.now)
    );
    content(&mut html);
    html.push_str(CLOSING);
    html
}

fn lamp(on: bool) -> &'static str {
    if on { ON_COLOR } else { OFF_COLOR }
}

pub fn status_page(
    header: &PageHeader<'_>,
    fatal: Option<&str>,
    display: &DisplaySnapshot,
    indicators: Indicators,
) -> String {
    page(header, |html| {
        if let Some(msg) = fatal {
            let _ = write!(html, "FATAL ERROR: {}<br>\r\n ", msg);
            return;
        }

        html.push_str("<p class=\"lcd\">\r\n");
        for row in &display.rows {
            html.push_str(&expand_arrows_and_blanks(row));
            html.push_str("<br>\r\n");
        }
        html.push_str("</p><div class=\"container\">\r\n");
        html.push_str("<img src=\"/buttonimage.jpg\" width=\"350\">\r\n");

        let lamps = [
            indicators.gen_connected,
            indicators.util_connected,
            indicators.gen_on,
            indicators.util_on,
            indicators.at_home,
        ];
        for (on, (left, top)) in lamps.into_iter().zip(LED_POSITIONS) {
            let _ = write!(
                html,
                "<span class=\"led\" style=\"background-color:{}; left:{}px; top:{}px\"> </span>\r\n",
                lamp(on),
                left,
                top
            );
        }

        html.push_str("<form action=\"pushbutton.html\" method=\"post\">\r\n");
        for (index, (left, top)) in BUTTON_POSITIONS.iter().enumerate() {
            let _ = write!(
                html,
                "<button class=\"button\" style=\"left:{}px; top:{}px\" type=\"submit\" name=\"button\" value=\"{}\"> </button>\r\n",
                left, top, index
            );
        }
        html.push_str("</form> </div>\r\n");
    })
}

pub fn log_page(header: &PageHeader<'_>, log: &EventLog) -> String {
    page(header, |html| {
        let _ = write!(
            html,
            "<p style=\"font-size:medium;\">{} log file entries<br>\r\n",
            log.len()
        );
        for entry in log.iter_newest_first() {
            let _ = write!(
                html,
                "{}  {}",
                format_datetime(entry.timestamp),
                entry.kind.name()
            );
            if let Some(aux) = entry.aux {
                let _ = write!(html, " {}", aux);
            }
            if let Some(msg) = &entry.message {
                let _ = write!(html, " {}", msg);
            }
            html.push_str("<br>\r\n");
        }
        html.push_str("</p>\r\n");
    })
}

pub fn visitors_page(
    header: &PageHeader<'_>,
    visitors: &VisitorRegistry,
    stats: &ConnectivityStats,
    port: u16,
) -> String {
    page(header, |html| {
        let _ = write!(
            html,
            "<p style=\"font-size:medium;\">{} total requests processed<br><br>\r\n",
            stats.requests_processed
        );
        // A record nobody has counted a visit for yet is not shown.
        for record in visitors.iter().filter(|r| r.count > 0) {
            let _ = write!(
                html,
                "IP {}:{} visited {} times{}<br>\r\n",
                record.addr,
                port,
                record.count,
                if record.authorized {
                    "; password was given"
                } else {
                    ""
                }
            );
        }
        let _ = write!(
            html,
            "<br>WiFi connects: {}, connect failures: {}, disconnects: {}, resets: {}</p>\r\n",
            stats.connects, stats.connect_failures, stats.disconnects, stats.resets
        );
    })
}

pub fn ask_password_page(header: &PageHeader<'_>) -> String {
    page(header, |html| {
        html.push_str("<form action=\"setpass.html\" method=\"post\">\r\n");
        html.push_str(
            "password: <input type=\"password\" name=\"pwd\" minlength=\"3\"><br>\r\n",
        );
        html.push_str("</form>\r\n");
    })
}

pub fn unknown_page(header: &PageHeader<'_>, kind: ResponseKind) -> String {
    page(header, |html| {
        let _ = write!(
            html,
            "<br>**** UNKNOWN HTTP REQUEST: {}<br>\r\n",
            kind.name()
        );
    })
}
