//! HTTP and WebSocket front end for the tapefetch pipeline.

pub mod api;
pub mod metrics;
pub mod state;
