//! Attendance register core and its stdin/stdout sidecar protocol.

pub mod app;
pub mod backup;
pub mod config;
pub mod config_writer;
pub mod cycle;
pub mod error;
pub mod gateway;
pub mod ipc;
pub mod lessons;
pub mod logging;
pub mod model;
pub mod pending;
pub mod reports;
pub mod stats;
pub mod store;
pub mod summary;
