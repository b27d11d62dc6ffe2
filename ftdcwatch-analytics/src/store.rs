//! In-memory time series store shared by ingestion and queries.

use std::sync::Arc;

use ftdcwatch_types::{DiskSeriesKind, DiskStats, DiskStatsMap, ServerInfo, TimeSeries};
use parking_lot::{RwLock, RwLockReadGuard};

use crate::catalog::WT_CACHE_MAX;
use crate::series::{DerivedSeries, SeriesMap};

/// Everything the store holds. Readers borrow it through
/// [`TimeSeriesStore::read`].
#[derive(Debug, Clone, Default)]
pub struct StoreData {
    /// Catalog series by name.
    pub series: SeriesMap,
    /// Per-device disk statistics.
    pub disks: DiskStatsMap,
    /// Per-member replication lag.
    pub replication_lags: SeriesMap,
    /// Host facts from the first file that reported them.
    pub server_info: ServerInfo,
    /// Configured WiredTiger cache size in GB, from the first `wt_cache_max`
    /// point. Zero when unknown.
    pub max_wt_cache_gb: f64,
}

impl StoreData {
    /// Look up a catalog series.
    pub fn get(&self, name: &str) -> Option<&TimeSeries> {
        self.series.get(name)
    }

    /// Sorted names of every catalog series.
    pub fn names(&self) -> Vec<String> {
        self.series.values().map(|s| s.target.clone()).collect()
    }

    /// Check whether no series holds any point.
    pub fn is_empty(&self) -> bool {
        self.series.values().all(TimeSeries::is_empty)
            && self.replication_lags.values().all(TimeSeries::is_empty)
            && self
                .disks
                .values()
                .all(|d| DiskSeriesKind::ALL.iter().all(|k| d.series(*k).is_empty()))
    }

    /// Merge one file's derived series.
    ///
    /// Each series either adopts the incoming points wholesale (when it is
    /// empty) or appends only the points strictly after its last timestamp.
    /// Merging the same data twice is therefore a no-op.
    pub fn merge(&mut self, derived: DerivedSeries, server_info: Option<ServerInfo>) {
        merge_map(&mut self.series, derived.series);
        merge_map(&mut self.replication_lags, derived.replication_lags);

        for (device, incoming) in derived.disks {
            let existing = self
                .disks
                .entry(device.clone())
                .or_insert_with(|| DiskStats::new(&device));
            for kind in DiskSeriesKind::ALL {
                merge_series(existing.series_mut(kind), incoming.series(kind).clone());
            }
        }

        if let Some(info) = server_info {
            if !self.server_info.is_known() && info.is_known() {
                self.server_info = info;
            }
        }

        self.max_wt_cache_gb = self
            .series
            .get(WT_CACHE_MAX)
            .and_then(|s| s.points.first())
            .map(|p| p.value)
            .unwrap_or(0.0);
    }
}

fn merge_map(existing: &mut SeriesMap, incoming: SeriesMap) {
    for (name, series) in incoming {
        match existing.get_mut(&name) {
            Some(current) => merge_series(current, series),
            None => {
                existing.insert(name, series);
            }
        }
    }
}

fn merge_series(existing: &mut TimeSeries, incoming: TimeSeries) {
    match existing.last_timestamp() {
        None => existing.points = incoming.points,
        Some(last) => existing.points.extend(
            incoming
                .points
                .into_iter()
                .filter(|p| p.timestamp_ms > last),
        ),
    }
}

/// Thread-safe store: one reader/writer lock over [`StoreData`].
///
/// Merges hold the write lock for their whole duration, so readers never see
/// a partially merged file.
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesStore {
    inner: Arc<RwLock<StoreData>>,
}

impl TimeSeriesStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the store for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, StoreData> {
        self.inner.read()
    }

    /// Merge a batch of per-file results under one write lock, in the order
    /// given.
    pub fn merge_all<I>(&self, results: I) -> usize
    where
        I: IntoIterator<Item = (DerivedSeries, Option<ServerInfo>)>,
    {
        let mut data = self.inner.write();
        let mut merged = 0;
        for (derived, info) in results {
            data.merge(derived, info);
            merged += 1;
        }
        merged
    }

    /// Merge a single file's results.
    pub fn merge(&self, derived: DerivedSeries, server_info: Option<ServerInfo>) {
        self.inner.write().merge(derived, server_info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftdcwatch_types::{DataPoint, HostInfo, SystemInfo};

    fn derived(name: &str, points: &[(f64, f64)]) -> DerivedSeries {
        let mut d = DerivedSeries::default();
        d.series.insert(
            name.to_string(),
            TimeSeries::with_points(
                name,
                points.iter().map(|(v, t)| DataPoint::new(*v, *t)).collect(),
            ),
        );
        d
    }

    #[test]
    fn test_merge_adopts_then_appends_suffix() {
        let store = TimeSeriesStore::new();
        store.merge(derived("ops_query", &[(1.0, 10.0), (2.0, 20.0)]), None);
        store.merge(derived("ops_query", &[(9.0, 20.0), (3.0, 30.0)]), None);

        let data = store.read();
        let ts: Vec<f64> = data.series["ops_query"]
            .points
            .iter()
            .map(|p| p.timestamp_ms)
            .collect();
        assert_eq!(ts, vec![10.0, 20.0, 30.0]);
        assert_eq!(data.series["ops_query"].points[1].value, 2.0);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let batch = derived("conns_current", &[(1.0, 10.0), (2.0, 20.0), (3.0, 30.0)]);
        let once = TimeSeriesStore::new();
        once.merge(batch.clone(), None);

        let twice = TimeSeriesStore::new();
        twice.merge_all(vec![(batch.clone(), None), (batch, None)]);

        assert_eq!(once.read().series, twice.read().series);
    }

    #[test]
    fn test_disks_merge_per_device() {
        let mut a = DerivedSeries::default();
        let mut sda = DiskStats::new("sda");
        sda.iops.push(DataPoint::new(5.0, 10.0));
        a.disks.insert("sda".to_string(), sda.clone());

        let store = TimeSeriesStore::new();
        store.merge(a.clone(), None);
        store.merge(a, None);
        assert_eq!(store.read().disks["sda"].iops.len(), 1);
        assert!(!store.read().is_empty());
    }

    #[test]
    fn test_max_cache_and_server_info_tracked() {
        let store = TimeSeriesStore::new();
        let info = ServerInfo {
            host_info: HostInfo {
                system: SystemInfo {
                    num_cores: 4,
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        };
        store.merge(
            derived(WT_CACHE_MAX, &[(8.0, 10.0), (16.0, 20.0)]),
            Some(info.clone()),
        );
        store.merge(derived("x", &[]), Some(ServerInfo::default()));

        let data = store.read();
        assert_eq!(data.max_wt_cache_gb, 8.0);
        assert_eq!(data.server_info, info);
        assert_eq!(crate::series::time_bounds(&data.series), Some((10.0, 20.0)));
    }
}
