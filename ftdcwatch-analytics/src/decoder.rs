//! Decoded file model and the FTDC decoder seam.
//!
//! Both input formats decode to the same shape: host facts plus a list of
//! batches, each a map from metric path to per-sample values with the
//! replica set status documents seen alongside it.

use std::path::Path;

use ftdcwatch_types::{ReplSetStatus, ServerInfo};

use crate::error::IngestError;
use crate::extract::{AttributeExtractor, MetricArrays};
use crate::series::SnapshotSet;

/// One decoded block of samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsBatch {
    /// Number of deltas in the block; the block holds `num_deltas + 1`
    /// samples when it came from an FTDC file.
    pub num_deltas: usize,
    /// Per-sample values keyed by slash-separated path.
    pub metrics: MetricArrays,
    /// Replica set status documents captured with this block.
    pub repl_status: Vec<ReplSetStatus>,
}

impl MetricsBatch {
    /// Samples to project: `num_deltas + 1`, capped by the longest array so
    /// a batch with no metrics yields none.
    pub fn sample_count(&self) -> usize {
        AttributeExtractor::new(&self.metrics)
            .sample_count()
            .min(self.num_deltas + 1)
    }
}

/// A fully decoded diagnostic file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedFile {
    /// Host facts from the file's metadata, when present.
    pub server_info: Option<ServerInfo>,
    pub batches: Vec<MetricsBatch>,
}

impl DecodedFile {
    /// Project every batch into typed snapshots, in file order.
    pub fn snapshots(&self) -> SnapshotSet {
        let mut set = SnapshotSet::default();
        for batch in &self.batches {
            let extractor = AttributeExtractor::new(&batch.metrics);
            let samples = batch.sample_count();
            set.server_status
                .extend((0..samples).map(|i| extractor.server_status(i)));
            set.system_metrics
                .extend((0..samples).map(|i| extractor.system_metrics(i)));
            set.repl_status.extend(batch.repl_status.iter().cloned());
        }
        set
    }
}

/// Decoder for binary `metrics.*` FTDC files.
///
/// Implementations decompress and delta-decode the file's chunks and return
/// them as [`MetricsBatch`]es.
pub trait FtdcDecoder: Send + Sync {
    /// Decode the raw bytes of one file.
    fn decode(&self, path: &Path, bytes: &[u8]) -> Result<DecodedFile, IngestError>;
}

/// Decoder used when no FTDC implementation is linked in.
///
/// Every binary file is reported as [`IngestError::DecoderUnavailable`], so
/// ingestion carries on with the keyhole_stats files it can read.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableDecoder;

impl FtdcDecoder for UnavailableDecoder {
    fn decode(&self, path: &Path, _bytes: &[u8]) -> Result<DecodedFile, IngestError> {
        Err(IngestError::DecoderUnavailable(path.to_path_buf()))
    }
}
