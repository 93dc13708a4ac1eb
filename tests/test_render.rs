use std::net::{IpAddr, Ipv4Addr};

use chrono::{NaiveDate, NaiveDateTime};
use genserve::eventlog::{EventKind, EventLog};
use genserve::host::{DisplaySnapshot, GLYPH_LEFT_ARROW, Indicators, NUM_BUTTONS};
use genserve::http::render::{
    PageHeader, ask_password_page, expand_arrows_and_blanks, format_datetime, log_page,
    status_page, unknown_page, visitors_page,
};
use genserve::http::response::ResponseKind;
use genserve::server::ConnectivityStats;
use genserve::visitors::VisitorRegistry;

fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 7, 4)
        .unwrap()
        .and_hms_opt(12, 0, 5)
        .unwrap()
}

fn header() -> PageHeader<'static> {
    PageHeader {
        title: "Lake house",
        now: noon(),
    }
}

#[test]
fn test_format_datetime() {
    assert_eq!(format_datetime(noon()), "2024-07-04 12:00:05");
}

#[test]
fn test_expand_left_arrow_and_blank() {
    let expanded = expand_arrows_and_blanks(&format!("{GLYPH_LEFT_ARROW} on"));
    assert_eq!(expanded, "&#8592;&nbsp;on");
    assert!(!expanded.contains('\x7f'));
}

#[test]
fn test_status_page_mirrors_display_and_lamps() {
    let display = DisplaySnapshot::from_rows(["Gen running", "\x7f back", "", ""]);
    let indicators = Indicators {
        gen_on: true,
        ..Indicators::default()
    };

    let html = status_page(&header(), None, &display, indicators);

    assert!(html.starts_with("<!DOCTYPE HTML>"));
    assert!(html.contains("<h1>Lake house generator</h1>"));
    assert!(html.contains("2024-07-04 12:00:05"));
    assert!(html.contains("Gen&nbsp;running<br>"));
    assert!(html.contains("&#8592;&nbsp;back<br>"));
    assert!(!html.contains('\x7f'));
    assert_eq!(html.matches("background-color:Gold").count(), 1);
    assert_eq!(html.matches("background-color:LightGray").count(), 4);
    assert_eq!(html.matches("name=\"button\"").count(), NUM_BUTTONS);
    assert!(html.contains("value=\"6\""));
    assert!(html.ends_with("</body></html>\r\n"));
}

#[test]
fn test_status_page_fatal_error_replaces_panel() {
    let html = status_page(
        &header(),
        Some("relay stuck"),
        &DisplaySnapshot::default(),
        Indicators::default(),
    );

    assert!(html.contains("FATAL ERROR: relay stuck"));
    assert!(!html.contains("class=\"lcd\""));
    assert!(!html.contains("pushbutton.html"));
}

#[test]
fn test_log_page_lists_newest_first() {
    let mut log = EventLog::new(10);
    log.append(noon(), EventKind::Startup, None, None);
    log.append(noon(), EventKind::WifiNoConnect, Some(2), None);
    log.append(noon(), EventKind::IftttQueued, None, Some("gen on"));

    let html = log_page(&header(), &log);

    assert!(html.contains("3 log file entries"));
    let queued = html.find("IFTTT queued gen on").unwrap();
    let failed = html.find("WiFi no connect 2").unwrap();
    let startup = html.find("startup").unwrap();
    assert!(queued < failed && failed < startup);
}

#[test]
fn test_visitors_page_reports_counts_and_stats() {
    let mut visitors = VisitorRegistry::new(5);
    let addr = IpAddr::V4(Ipv4Addr::new(10, 1, 1, 20));
    let record = visitors.lookup_or_create(addr);
    record.record_visit();
    record.record_visit();
    record.authorized = true;
    let stats = ConnectivityStats {
        connects: 2,
        connect_failures: 1,
        disconnects: 1,
        resets: 0,
        requests_processed: 7,
    };

    let html = visitors_page(&header(), &visitors, &stats, 80);

    assert!(html.contains("7 total requests processed"));
    assert!(html.contains("IP 10.1.1.20:80 visited 2 times; password was given"));
    assert!(html.contains("WiFi connects: 2, connect failures: 1, disconnects: 1, resets: 0"));
}

#[test]
fn test_visitors_page_skips_uncounted_records() {
    let mut visitors = VisitorRegistry::new(5);
    visitors.lookup_or_create(IpAddr::V4(Ipv4Addr::new(10, 1, 1, 21)));
    visitors
        .lookup_or_create(IpAddr::V4(Ipv4Addr::new(10, 1, 1, 22)))
        .record_visit();

    let html = visitors_page(&header(), &visitors, &ConnectivityStats::default(), 80);

    assert!(!html.contains("10.1.1.21"));
    assert!(!html.contains("visited 0 times"));
    assert!(html.contains("IP 10.1.1.22:80 visited 1 times"));
}

#[test]
fn test_ask_password_page_has_form() {
    let html = ask_password_page(&header());
    assert!(html.contains("action=\"setpass.html\""));
    assert!(html.contains("name=\"pwd\""));
}

#[test]
fn test_unknown_page_names_kind() {
    let html = unknown_page(&header(), ResponseKind::Unknown);
    assert!(html.contains("**** UNKNOWN HTTP REQUEST: unknown"));
}
