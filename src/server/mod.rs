//! The web service driver.
//!
//! - **`state`**: connectivity state machine and the [`Controller`] entry point
//! - **`deferred`**: delayed response to button pushes

pub mod deferred;
pub mod state;

pub use state::{Connectivity, ConnectivityState, ConnectivityStats, Controller, ServiceStep, WebContext};
