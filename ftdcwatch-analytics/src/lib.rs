//! # ftdcwatch-analytics
//!
//! Analytics engine for MongoDB diagnostic data. It turns decoded FTDC
//! batches and keyhole_stats files into an in-memory time series store, and
//! scores each metric against watermarks to produce a health assessment.
//!
//! ## Pipeline
//!
//! - **Extraction**: [`AttributeExtractor`] projects per-sample metric arrays
//!   into typed `serverStatus` and `systemMetrics` snapshots
//! - **Derivation**: [`derive`] turns snapshots into named series (rates,
//!   gauges, disk stats, replication lag) on four concurrent passes
//! - **Storage**: [`TimeSeriesStore`] merges series idempotently behind one
//!   reader/writer lock
//! - **Queries**: [`range::filter`] slices and downsamples a window,
//!   [`Percentiles`] extracts p5/median/p95
//! - **Scoring**: [`ScoringConfig`] maps percentiles to 0..=100 scores and
//!   [`Assessment`] ranks every metric for a window
//!
//! ## Example
//!
//! ```rust,no_run
//! use ftdcwatch_analytics::{Assessment, IngestionOrchestrator, TimeSeriesStore};
//!
//! let orchestrator = IngestionOrchestrator::new(TimeSeriesStore::new());
//! let report = orchestrator.ingest(&["diagnostic.data"])?;
//!
//! if let (Some(from), Some(to)) = (report.first_ms, report.last_ms) {
//!     let data = orchestrator.store().read();
//!     let table = Assessment::new(&data).table(from as f64, to as f64);
//!     println!("{} rows", table.rows.len());
//! }
//! # Ok::<(), ftdcwatch_analytics::IngestError>(())
//! ```

pub mod assessment;
pub mod catalog;
pub mod decoder;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod keyhole;
pub mod range;
pub mod score;
pub mod series;
pub mod store;

pub use assessment::{Assessment, AssessmentRow, Cell, Column, Table};
pub use decoder::{DecodedFile, FtdcDecoder, MetricsBatch, UnavailableDecoder};
pub use error::{IngestError, RangeError};
pub use extract::{AttributeExtractor, MetricArrays};
pub use ingest::{discover_files, IngestOptions, IngestReport, IngestionOrchestrator};
pub use range::Percentiles;
pub use score::{score_by_range, HostFacts, ScoreFormula, ScoreRule, ScoringConfig};
pub use series::{derive, DerivedSeries, SeriesMap, SnapshotSet};
pub use store::{StoreData, TimeSeriesStore};
