//! API Module
//!
//! HTTP boundary for operators and external callers.

mod http;

pub use http::{AppState, HttpServer};
