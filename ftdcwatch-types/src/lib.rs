//! # ftdcwatch-types
//!
//! Core types for MongoDB FTDC analytics. This crate defines the data model
//! shared by the ingestion engine and the query server: typed snapshots
//! projected from decoded FTDC samples, the derived time series, and the
//! host facts used to normalize scores.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable the `serde` feature for JSON output
//! - **Tolerant snapshots**: Every counter defaults to zero so schema drift across
//!   server versions never prevents a snapshot from being built
//!
//! ## Features
//!
//! - `serde`: JSON serialization via serde. Data points serialize as
//!   `[value, timestampMs]` pairs, the shape dashboard datasources expect.
//!
//! ## Example
//!
//! ```rust
//! use ftdcwatch_types::{DataPoint, TimeSeries};
//!
//! let mut series = TimeSeries::new("conns_current");
//! series.push(DataPoint::new(42.0, 1_600_000_000_000.0));
//! series.push(DataPoint::new(40.0, 1_600_000_001_000.0));
//!
//! assert_eq!(series.len(), 2);
//! assert_eq!(series.last_timestamp(), Some(1_600_000_001_000.0));
//! ```

mod host;
mod replica;
mod series;
mod snapshot;

pub use host::*;
pub use replica::*;
pub use series::*;
pub use snapshot::*;

/// Bytes per megabyte, used by the byte-to-MB rate conversions.
pub const MB: f64 = 1024.0 * 1024.0;

/// Bytes per gigabyte, used by the WiredTiger cache gauges.
pub const GB: f64 = 1024.0 * 1024.0 * 1024.0;
