//! Range queries, downsampling and percentile extraction.

use ftdcwatch_types::{DataPoint, TimeSeries};

/// Upper bound on the number of points returned for one series.
pub const MAX_POINTS: usize = 1800;

/// Points with `from_ms <= timestamp <= to_ms`, located by binary search.
pub fn window_slice(points: &[DataPoint], from_ms: f64, to_ms: f64) -> &[DataPoint] {
    let start = points.partition_point(|p| p.timestamp_ms < from_ms);
    let end = points.partition_point(|p| p.timestamp_ms <= to_ms);
    if start >= end {
        &[]
    } else {
        &points[start..end]
    }
}

/// Restrict a series to a time window, resampling to at most
/// [`MAX_POINTS`] points.
///
/// Resampling picks points by index (`floor(len * i / MAX_POINTS)`); it does
/// not aggregate. A window that is empty, or whose first value is NaN,
/// yields an empty series under the same name.
pub fn filter(series: &TimeSeries, from_ms: f64, to_ms: f64) -> TimeSeries {
    let window = window_slice(&series.points, from_ms, to_ms);
    match window.first() {
        None => return TimeSeries::new(series.target.as_str()),
        Some(first) if first.value.is_nan() => return TimeSeries::new(series.target.as_str()),
        Some(_) => {}
    }

    let points = if window.len() > MAX_POINTS {
        let len = window.len();
        (0..MAX_POINTS).map(|i| window[len * i / MAX_POINTS]).collect()
    } else {
        window.to_vec()
    };

    TimeSeries::with_points(series.target.as_str(), points)
}

/// The 5th, 50th and 95th percentile of a window.
///
/// All three are NaN when the window had no data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percentiles {
    pub p5: f64,
    pub median: f64,
    pub p95: f64,
}

impl Percentiles {
    /// Percentiles of an empty window.
    pub const MISSING: Percentiles = Percentiles {
        p5: f64::NAN,
        median: f64::NAN,
        p95: f64::NAN,
    };

    /// Nearest-rank percentiles: the value at `floor((n + 1) * q)` of the
    /// sorted values, clamped to the last index.
    pub fn from_values(mut values: Vec<f64>) -> Self {
        if values.is_empty() {
            return Self::MISSING;
        }
        values.sort_by(f64::total_cmp);
        let last = values.len() - 1;
        let rank = |q: f64| {
            let idx = ((values.len() + 1) as f64 * q).floor() as usize;
            values[idx.min(last)]
        };
        Self {
            p5: rank(0.05),
            median: rank(0.5),
            p95: rank(0.95),
        }
    }

    /// Percentiles of a series over a window, after downsampling.
    pub fn of_window(series: &TimeSeries, from_ms: f64, to_ms: f64) -> Self {
        Self::from_values(filter(series, from_ms, to_ms).values().collect())
    }

    /// Check whether any percentile is NaN.
    pub fn is_missing(&self) -> bool {
        self.p5.is_nan() || self.median.is_nan() || self.p95.is_nan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(n: usize) -> TimeSeries {
        TimeSeries::with_points(
            "ops_query",
            (0..n)
                .map(|i| DataPoint::new(i as f64, (i * 1000) as f64))
                .collect(),
        )
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let s = series(10);
        let w = window_slice(&s.points, 2000.0, 5000.0);
        assert_eq!(w.len(), 4);
        assert_eq!(w[0].timestamp_ms, 2000.0);
        assert_eq!(w[3].timestamp_ms, 5000.0);
    }

    #[test]
    fn test_window_outside_range_is_empty() {
        let s = series(10);
        assert!(window_slice(&s.points, 20_000.0, 30_000.0).is_empty());
        assert!(window_slice(&s.points, 5_000.0, 1_000.0).is_empty());
        assert!(filter(&s, 20_000.0, 30_000.0).is_empty());
    }

    #[test]
    fn test_filter_downsamples_to_bound() {
        let s = series(5000);
        let f = filter(&s, 0.0, f64::MAX);
        assert_eq!(f.len(), MAX_POINTS);
        assert_eq!(f.target, "ops_query");
        assert_eq!(f.points[0], s.points[0]);
        assert_eq!(f.points[1], s.points[5000 / MAX_POINTS]);
        assert!(f
            .points
            .windows(2)
            .all(|w| w[0].timestamp_ms < w[1].timestamp_ms));
    }

    #[test]
    fn test_filter_small_window_unchanged() {
        let s = series(100);
        assert_eq!(filter(&s, 0.0, 1e9).points, s.points);
    }

    #[test]
    fn test_nan_first_point_is_no_data() {
        let s = TimeSeries::with_points(
            "x",
            vec![DataPoint::new(f64::NAN, 0.0), DataPoint::new(1.0, 1.0)],
        );
        assert!(filter(&s, 0.0, 10.0).is_empty());
    }

    #[test]
    fn test_percentiles_nearest_rank() {
        let p = Percentiles::from_values((1..=100).map(f64::from).collect());
        // floor(101 * q) -> indexes 5, 50, 95
        assert_eq!(p.p5, 6.0);
        assert_eq!(p.median, 51.0);
        assert_eq!(p.p95, 96.0);
    }

    #[test]
    fn test_percentiles_single_value_and_empty() {
        let p = Percentiles::from_values(vec![7.0]);
        assert_eq!((p.p5, p.median, p.p95), (7.0, 7.0, 7.0));
        assert!(Percentiles::from_values(Vec::new()).is_missing());
    }

    #[test]
    fn test_percentiles_are_ordered() {
        let values = vec![9.0, 1.0, 4.0, 4.0, 100.0, 0.5, 3.0];
        let p = Percentiles::from_values(values);
        assert!(p.p5 <= p.median && p.median <= p.p95);
    }
}
