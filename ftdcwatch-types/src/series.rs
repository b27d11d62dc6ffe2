//! Time series - ordered (value, timestamp) sequences derived from snapshots.

use std::collections::BTreeMap;

/// A single observation in a time series.
///
/// Timestamps are milliseconds since the Unix epoch, kept as `f64` so that
/// points can be handed to plotting frontends without conversion.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(into = "[f64; 2]", from = "[f64; 2]")
)]
pub struct DataPoint {
    /// Observed value.
    pub value: f64,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: f64,
}

impl DataPoint {
    /// Create a new data point.
    pub fn new(value: f64, timestamp_ms: f64) -> Self {
        Self {
            value,
            timestamp_ms,
        }
    }

    /// Create a data point with negative values clamped to zero.
    ///
    /// Every derived series goes through this constructor: counters that
    /// appear to run backwards must never surface as negative rates.
    pub fn non_negative(value: f64, timestamp_ms: f64) -> Self {
        Self::new(if value < 0.0 { 0.0 } else { value }, timestamp_ms)
    }
}

impl From<DataPoint> for [f64; 2] {
    fn from(dp: DataPoint) -> Self {
        [dp.value, dp.timestamp_ms]
    }
}

impl From<[f64; 2]> for DataPoint {
    fn from(pair: [f64; 2]) -> Self {
        DataPoint::new(pair[0], pair[1])
    }
}

/// A named, append-only sequence of data points.
///
/// Timestamps are non-decreasing. Producers only ever push points in time
/// order; the store only ever appends suffixes that start after the last
/// stored timestamp.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeSeries {
    /// Series name (target) as exposed to the dashboard.
    pub target: String,

    /// Points in non-decreasing timestamp order.
    #[cfg_attr(feature = "serde", serde(rename = "datapoints"))]
    pub points: Vec<DataPoint>,
}

impl TimeSeries {
    /// Create an empty series with the given name.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            points: Vec::new(),
        }
    }

    /// Create a series from existing points.
    pub fn with_points(target: impl Into<String>, points: Vec<DataPoint>) -> Self {
        Self {
            target: target.into(),
            points,
        }
    }

    /// Append a point.
    pub fn push(&mut self, point: DataPoint) {
        self.points.push(point);
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the series has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Timestamp of the first point, if any.
    pub fn first_timestamp(&self) -> Option<f64> {
        self.points.first().map(|p| p.timestamp_ms)
    }

    /// Timestamp of the last point, if any.
    pub fn last_timestamp(&self) -> Option<f64> {
        self.points.last().map(|p| p.timestamp_ms)
    }

    /// Iterate over the values, ignoring timestamps.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.value)
    }

    /// Return a copy of this series under a different name.
    pub fn renamed(&self, target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            points: self.points.clone(),
        }
    }
}

/// The per-device series kept for every discovered disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiskSeriesKind {
    /// Reads plus writes per second.
    Iops,
    /// Percentage of the sampling interval the device was busy.
    Utilization,
    /// Requests in flight at sample time.
    QueueLength,
    /// Milliseconds spent reading during the interval.
    ReadTimeMs,
    /// Milliseconds spent writing during the interval.
    WriteTimeMs,
    /// Milliseconds requests spent queued during the interval.
    IoQueuedMs,
}

impl DiskSeriesKind {
    /// All kinds, in display order.
    pub const ALL: [DiskSeriesKind; 6] = [
        DiskSeriesKind::Iops,
        DiskSeriesKind::Utilization,
        DiskSeriesKind::QueueLength,
        DiskSeriesKind::ReadTimeMs,
        DiskSeriesKind::WriteTimeMs,
        DiskSeriesKind::IoQueuedMs,
    ];
}

/// Bundle of time series for one disk device.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiskStats {
    pub iops: TimeSeries,
    pub utilization: TimeSeries,
    pub queue_length: TimeSeries,
    pub read_time_ms: TimeSeries,
    pub write_time_ms: TimeSeries,
    pub io_queued_ms: TimeSeries,
}

impl DiskStats {
    /// Create an empty bundle whose series are all named after the device.
    pub fn new(device: &str) -> Self {
        Self {
            iops: TimeSeries::new(device),
            utilization: TimeSeries::new(device),
            queue_length: TimeSeries::new(device),
            read_time_ms: TimeSeries::new(device),
            write_time_ms: TimeSeries::new(device),
            io_queued_ms: TimeSeries::new(device),
        }
    }

    /// Borrow one of the device's series.
    pub fn series(&self, kind: DiskSeriesKind) -> &TimeSeries {
        match kind {
            DiskSeriesKind::Iops => &self.iops,
            DiskSeriesKind::Utilization => &self.utilization,
            DiskSeriesKind::QueueLength => &self.queue_length,
            DiskSeriesKind::ReadTimeMs => &self.read_time_ms,
            DiskSeriesKind::WriteTimeMs => &self.write_time_ms,
            DiskSeriesKind::IoQueuedMs => &self.io_queued_ms,
        }
    }

    /// Mutably borrow one of the device's series.
    pub fn series_mut(&mut self, kind: DiskSeriesKind) -> &mut TimeSeries {
        match kind {
            DiskSeriesKind::Iops => &mut self.iops,
            DiskSeriesKind::Utilization => &mut self.utilization,
            DiskSeriesKind::QueueLength => &mut self.queue_length,
            DiskSeriesKind::ReadTimeMs => &mut self.read_time_ms,
            DiskSeriesKind::WriteTimeMs => &mut self.write_time_ms,
            DiskSeriesKind::IoQueuedMs => &mut self.io_queued_ms,
        }
    }
}

/// Disk bundles keyed by device name.
pub type DiskStatsMap = BTreeMap<String, DiskStats>;
