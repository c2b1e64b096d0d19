//! HTTP and WebSocket front for the hold'em table engine.

pub mod api;
pub mod config;
pub mod logging;
