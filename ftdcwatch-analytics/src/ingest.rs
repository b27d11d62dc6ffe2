//! Multi-file ingestion into a [`TimeSeriesStore`].
//!
//! Files are decoded and derived in parallel on a bounded worker pool, each
//! into its own result. Once every worker is done the results are merged into
//! the store in path order under a single write lock, so the outcome does not
//! depend on which worker finished first.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use ftdcwatch_types::ServerInfo;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::decoder::{DecodedFile, FtdcDecoder, UnavailableDecoder};
use crate::error::IngestError;
use crate::keyhole::read_keyhole_stats;
use crate::series::{derive, DerivedSeries};
use crate::store::TimeSeriesStore;

const FTDC_PREFIX: &str = "metrics.";
const KEYHOLE_PREFIX: &str = "keyhole_stats.";

/// Check whether a file name looks like FTDC or keyhole_stats output.
pub fn is_diagnostic_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(FTDC_PREFIX) || n.starts_with(KEYHOLE_PREFIX))
        .unwrap_or(false)
}

/// Expand files and directories into the sorted list of diagnostic files.
///
/// Directories contribute their regular files whose names start with
/// `metrics.` or `keyhole_stats.`. Paths that cannot be read are skipped
/// with a warning. With `latest` set, only the last N files are kept.
pub fn discover_files<P: AsRef<Path>>(
    paths: &[P],
    latest: Option<usize>,
) -> Result<Vec<PathBuf>, IngestError> {
    let mut files = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        if meta.is_dir() {
            let entries = fs::read_dir(path).map_err(|e| IngestError::io(path, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| IngestError::io(path, e))?;
                let candidate = entry.path();
                if candidate.is_file() && is_diagnostic_file(&candidate) {
                    files.push(candidate);
                }
            }
        } else if meta.is_file() && is_diagnostic_file(path) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    files.dedup();

    if let Some(n) = latest.filter(|n| *n > 0) {
        if files.len() > n {
            files.drain(..files.len() - n);
        }
    }

    if files.is_empty() {
        return Err(IngestError::NoFiles);
    }
    Ok(files)
}

/// Knobs for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestOptions {
    /// Worker threads; defaults to one less than the available cores.
    pub workers: Option<usize>,
    /// Keep only the last N discovered files.
    pub latest: Option<usize>,
}

impl IngestOptions {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_latest(mut self, latest: usize) -> Self {
        self.latest = Some(latest);
        self
    }

    fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
        })
        .max(1)
    }
}

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Files merged into the store, in merge order.
    pub loaded: Vec<PathBuf>,
    /// Files that failed, with the reason.
    pub failures: Vec<(PathBuf, String)>,
    /// Earliest timestamp in the files loaded by this run.
    pub first_ms: Option<i64>,
    /// Latest timestamp in the files loaded by this run.
    pub last_ms: Option<i64>,
}

impl IngestReport {
    /// Dashboard links covering the loaded time range, one per dashboard
    /// path. Empty when the loaded files held no timestamps.
    pub fn endpoints<S: AsRef<str>>(&self, dashboards: &[S]) -> Vec<String> {
        match (self.first_ms, self.last_ms) {
            (Some(from), Some(to)) => dashboards
                .iter()
                .map(|d| format!("{}?orgId=1&from={}&to={}", d.as_ref(), from, to))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// One file's derived series plus the host facts it carried.
type FileSeries = (DerivedSeries, Option<ServerInfo>);

/// Reads diagnostic files and merges them into a shared store.
pub struct IngestionOrchestrator {
    store: TimeSeriesStore,
    decoder: Arc<dyn FtdcDecoder>,
    options: IngestOptions,
}

impl IngestionOrchestrator {
    /// Create an orchestrator over `store` with no FTDC decoder.
    pub fn new(store: TimeSeriesStore) -> Self {
        Self {
            store,
            decoder: Arc::new(UnavailableDecoder),
            options: IngestOptions::default(),
        }
    }

    /// Use `decoder` for binary `metrics.*` files.
    pub fn with_decoder(mut self, decoder: Arc<dyn FtdcDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &TimeSeriesStore {
        &self.store
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Discover and ingest files using the configured options.
    pub fn ingest<P: AsRef<Path>>(&self, paths: &[P]) -> Result<IngestReport, IngestError> {
        self.ingest_with(paths, &self.options)
    }

    /// Discover and ingest files with per-call options.
    pub fn ingest_with<P: AsRef<Path>>(
        &self,
        paths: &[P],
        options: &IngestOptions,
    ) -> Result<IngestReport, IngestError> {
        let files = discover_files(paths, options.latest)?;
        self.ingest_files(&files, options.worker_count())
    }

    fn ingest_files(&self, files: &[PathBuf], workers: usize) -> Result<IngestReport, IngestError> {
        info!("Ingesting {} files with {} workers", files.len(), workers);
        let started = Instant::now();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("ftdc-ingest-{i}"))
            .build()
            .map_err(|e| IngestError::WorkerPool(e.to_string()))?;

        let results: BTreeMap<PathBuf, Result<FileSeries, IngestError>> = pool.install(|| {
            files
                .par_iter()
                .map(|path| (path.clone(), self.load_file(path)))
                .collect()
        });

        let mut report = IngestReport::default();
        let mut ready = Vec::with_capacity(results.len());
        for (path, result) in results {
            match result {
                Ok(file_series) => {
                    report.loaded.push(path);
                    ready.push(file_series);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    report.failures.push((path, e.to_string()));
                }
            }
        }

        if ready.is_empty() {
            let first = report
                .failures
                .first()
                .map(|(_, reason)| reason.clone())
                .unwrap_or_default();
            return Err(IngestError::AllFailed {
                failed: report.failures.len(),
                first,
            });
        }

        let bounds = ready
            .iter()
            .filter_map(|(derived, _)| derived.time_bounds())
            .reduce(|(first, last), (f, l)| (first.min(f), last.max(l)));
        if let Some((first, last)) = bounds {
            report.first_ms = Some(first as i64);
            report.last_ms = Some(last as i64);
        }

        let merged = self.store.merge_all(ready);

        info!(
            "Merged {} files ({} failed) in {:?}",
            merged,
            report.failures.len(),
            started.elapsed()
        );
        Ok(report)
    }

    fn load_file(&self, path: &Path) -> Result<FileSeries, IngestError> {
        let started = Instant::now();
        let decoded = self.decode_file(path)?;
        let snapshots = decoded.snapshots();
        if snapshots.is_empty() {
            return Err(IngestError::NoDocuments(path.to_path_buf()));
        }

        let derived = derive(&snapshots);
        debug!(
            "Derived {} points from {} in {:?}",
            derived.point_count(),
            path.display(),
            started.elapsed()
        );
        Ok((derived, decoded.server_info))
    }

    fn decode_file(&self, path: &Path) -> Result<DecodedFile, IngestError> {
        let is_keyhole = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(KEYHOLE_PREFIX));

        if is_keyhole {
            read_keyhole_stats(path)
        } else {
            let bytes = fs::read(path).map_err(|e| IngestError::io(path, e))?;
            self.decoder.decode(path, &bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn write_keyhole(dir: &Path, name: &str, start_secs: i64, samples: i64) -> PathBuf {
        let docs: Vec<_> = (0..samples)
            .map(|i| {
                json!({
                    "localTime": {"$date": (start_secs + i) * 1000},
                    "uptime": start_secs + i,
                    "connections": {"current": 10 + i},
                })
            })
            .collect();
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "{}", serde_json::to_string(&docs).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        write_keyhole(dir.path(), "keyhole_stats.b", 1, 1);
        write_keyhole(dir.path(), "keyhole_stats.a", 1, 1);
        fs::write(dir.path().join("metrics.interim"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        fs::create_dir(dir.path().join("metrics.subdir")).unwrap();

        let files = discover_files(&[dir.path()], None).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["keyhole_stats.a", "keyhole_stats.b", "metrics.interim"]);

        let latest = discover_files(&[dir.path()], Some(1)).unwrap();
        assert_eq!(latest.len(), 1);
        assert!(latest[0].ends_with("metrics.interim"));
    }

    #[test]
    fn test_discover_nothing_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            discover_files(&[dir.path(), missing.as_path()], None),
            Err(IngestError::NoFiles)
        ));
    }

    #[test]
    fn test_ingest_merges_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_keyhole(dir.path(), "keyhole_stats.2", 1_700_000_100, 3);
        write_keyhole(dir.path(), "keyhole_stats.1", 1_700_000_000, 3);

        let orchestrator = IngestionOrchestrator::new(TimeSeriesStore::new())
            .with_options(IngestOptions::default().with_workers(2));
        let report = orchestrator.ingest(&[dir.path()]).unwrap();

        assert_eq!(report.loaded.len(), 2);
        assert!(report.failures.is_empty());
        assert_eq!(report.first_ms, Some(1_700_000_000_000));
        assert_eq!(report.last_ms, Some(1_700_000_102_000));

        let data = orchestrator.store().read();
        let conns = data.get("conns_current").unwrap();
        assert_eq!(conns.len(), 6);
        let ts: Vec<f64> = conns.points.iter().map(|p| p.timestamp_ms).collect();
        let mut sorted = ts.clone();
        sorted.sort_by(f64::total_cmp);
        assert_eq!(ts, sorted);
    }

    #[test]
    fn test_reingest_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_keyhole(dir.path(), "keyhole_stats.1", 1_700_000_000, 4);

        let orchestrator = IngestionOrchestrator::new(TimeSeriesStore::new());
        orchestrator.ingest(&[dir.path()]).unwrap();
        orchestrator.ingest(&[dir.path()]).unwrap();

        assert_eq!(orchestrator.store().read().get("conns_current").unwrap().len(), 4);
    }

    #[test]
    fn test_report_range_covers_only_files_just_loaded() {
        let earlier = tempfile::tempdir().unwrap();
        let later = tempfile::tempdir().unwrap();
        write_keyhole(earlier.path(), "keyhole_stats.1", 1_700_000_000, 3);
        write_keyhole(later.path(), "keyhole_stats.2", 1_700_005_000, 2);

        let orchestrator = IngestionOrchestrator::new(TimeSeriesStore::new());
        orchestrator.ingest(&[earlier.path()]).unwrap();
        let report = orchestrator.ingest(&[later.path()]).unwrap();

        assert_eq!(report.first_ms, Some(1_700_005_000_000));
        assert_eq!(report.last_ms, Some(1_700_005_001_000));
        assert_eq!(
            report.endpoints(&["/d/a"]),
            vec!["/d/a?orgId=1&from=1700005000000&to=1700005001000"]
        );
        assert_eq!(orchestrator.store().read().get("conns_current").unwrap().len(), 5);
    }

    #[test]
    fn test_failed_file_does_not_abort_siblings() {
        let dir = tempfile::tempdir().unwrap();
        write_keyhole(dir.path(), "keyhole_stats.1", 1_700_000_000, 2);
        fs::write(dir.path().join("metrics.2024-01-01"), b"\x00\x01").unwrap();

        let orchestrator = IngestionOrchestrator::new(TimeSeriesStore::new());
        let report = orchestrator.ingest(&[dir.path()]).unwrap();

        assert_eq!(report.loaded.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].1.contains("No FTDC decoder"));
    }

    #[test]
    fn test_all_failed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keyhole_stats.bad"), b"not json\n").unwrap();

        let orchestrator = IngestionOrchestrator::new(TimeSeriesStore::new());
        let err = orchestrator.ingest(&[dir.path()]).unwrap_err();
        assert!(matches!(err, IngestError::AllFailed { failed: 1, .. }));
        assert!(orchestrator.store().read().is_empty());
    }

    #[test]
    fn test_custom_decoder_is_used_for_metrics_files() {
        struct Fixed;
        impl FtdcDecoder for Fixed {
            fn decode(&self, _path: &Path, _bytes: &[u8]) -> Result<DecodedFile, IngestError> {
                let metrics = [
                    ("serverStatus/localTime".to_string(), vec![1_000, 2_000]),
                    ("serverStatus/uptime".to_string(), vec![1, 2]),
                    ("serverStatus/connections/current".to_string(), vec![7, 8]),
                ]
                .into_iter()
                .collect();
                Ok(DecodedFile {
                    server_info: None,
                    batches: vec![crate::decoder::MetricsBatch {
                        num_deltas: 1,
                        metrics,
                        repl_status: Vec::new(),
                    }],
                })
            }
        }

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("metrics.1"), b"raw").unwrap();

        let orchestrator =
            IngestionOrchestrator::new(TimeSeriesStore::new()).with_decoder(Arc::new(Fixed));
        orchestrator.ingest(&[dir.path()]).unwrap();

        let data = orchestrator.store().read();
        let values: Vec<f64> = data.get("conns_current").unwrap().values().collect();
        assert_eq!(values, vec![7.0, 8.0]);
    }

    #[test]
    fn test_endpoints() {
        let report = IngestReport {
            first_ms: Some(1000),
            last_ms: Some(5000),
            ..Default::default()
        };
        assert_eq!(
            report.endpoints(&["/d/ftdc"]),
            vec!["/d/ftdc?orgId=1&from=1000&to=5000".to_string()]
        );
        assert!(IngestReport::default().endpoints(&["/d/ftdc"]).is_empty());
    }
}
