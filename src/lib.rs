//! pidash - live-metrics client for a Raspberry Pi monitoring dashboard
//!
//! This library provides:
//! - A bearer-authenticated client for the appliance REST API
//! - Per-view pollers with change coalescing, commit throttling and
//!   cross-mount snapshot persistence
//! - A bounded metrics history for the time-series chart
//! - Settings and user administration with optimistic link updates
//! - An event bus carrying user-visible notifications

pub mod api;
pub mod bus;
pub mod config;
pub mod dashboard;
pub mod links;
pub mod settings;
pub mod sync;
pub mod views;
