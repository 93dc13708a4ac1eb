//! genserve - web status and control for a generator transfer switch
//!
//! Core library: connectivity state machine, single-client HTTP server,
//! visitor table, event log and outbound notifications.

pub mod config;
pub mod eventlog;
pub mod host;
pub mod http;
pub mod net;
pub mod notify;
pub mod server;
pub mod sim;
pub mod visitors;
