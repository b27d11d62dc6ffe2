//! # ftdcwatch
//!
//! Query server and command line front end for the FTDC analytics engine.
//! The server speaks the JSON datasource protocol a Grafana dashboard uses,
//! backed by a [`TimeSeriesStore`](ftdcwatch_analytics::TimeSeriesStore)
//! filled from `metrics.*` and `keyhole_stats.*` files.

pub mod config;
pub mod report;
pub mod server;

pub use config::{ServerConfig, ServerConfigBuilder};
