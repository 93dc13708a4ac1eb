//! Minimal single-client HTTP server.
//!
//! A small subset of HTTP/1.1: one request per
//! connection, a fixed set of routes, and every response closed by the
//! server.
//!
//! # Architecture
//!
//! - **`connection`**: handles one client from request to close
//! - **`parser`**: bounded line reader and request classifier
//! - **`request`**: typed routes and the classified request
//! - **`response`**: response kinds and the response builder
//! - **`render`**: HTML pages
//! - **`writer`**: chunked output, input drain and close
//! - **`assets`**: built-in images
//!
//! # Request cycle
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← request line and headers, then form body
//!        └──────┬──────┘
//!               │ classified
//!               ▼
//!        ┌──────────────────┐
//!        │   Routing        │ ← visitor lookup, password and button checks
//!        └──────┬───────────┘
//!               ├─ button push → deferred (connection held open)
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← chunked, aborts silently on disconnect
//!        └──────┬───────────┘
//!               ▼
//!          drain input, close
//! ```

pub mod assets;
pub mod connection;
pub mod parser;
pub mod render;
pub mod request;
pub mod response;
pub mod writer;
