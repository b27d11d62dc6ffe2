//! Watermark scoring.
//!
//! A score maps a window's (p5, median, p95) to 0..=100 where 100 is
//! healthy and 0 is at or beyond the high watermark. [`NOT_EVALUABLE`]
//! marks a metric that could not be scored: no data, or a normalization
//! denominator the host did not report.
//!
//! Every metric is bound to a [`ScoreRule`] when the [`ScoringConfig`] is
//! built. The config is immutable and built from [`HostFacts`], so two
//! assessments over different hosts never share watermark state.

use std::collections::BTreeMap;

use ftdcwatch_types::{DataPoint, GB};

use crate::range::{window_slice, Percentiles};
use crate::store::StoreData;

/// Score of a metric that could not be evaluated.
pub const NOT_EVALUABLE: i32 = 101;

/// Map a value onto 0..=100 against a (low, high) watermark pair.
///
/// Below `low` scores 100, above `high` scores 0, and values in between
/// interpolate linearly. NaN is [`NOT_EVALUABLE`].
pub fn score_by_range(v: f64, low: f64, high: f64) -> i32 {
    if v.is_nan() {
        NOT_EVALUABLE
    } else if v < low {
        100
    } else if v > high {
        0
    } else if high <= low {
        100
    } else {
        (100.0 * (1.0 - (v - low) / (high - low))) as i32
    }
}

/// Host facts the scoring formulas normalize against. Zero means unknown.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HostFacts {
    pub num_cores: u32,
    pub mem_size_mb: u64,
    pub max_wt_cache_gb: f64,
}

impl HostFacts {
    /// Facts currently known to the store.
    pub fn from_store(data: &StoreData) -> Self {
        Self {
            num_cores: data.server_info.host_info.system.num_cores,
            mem_size_mb: data.server_info.host_info.system.mem_size_mb,
            max_wt_cache_gb: data.max_wt_cache_gb,
        }
    }

    fn mem_size_gb(&self) -> Option<f64> {
        (self.mem_size_mb > 0).then(|| self.mem_size_mb as f64 / 1024.0)
    }

    fn max_wt_cache(&self) -> Option<f64> {
        (self.max_wt_cache_gb > 0.0).then_some(self.max_wt_cache_gb)
    }

    /// 5% of the WiredTiger cache, in 4 KB pages.
    fn eviction_pages(&self) -> Option<f64> {
        self.max_wt_cache()
            .map(|gb| 0.05 * gb * GB / 4096.0)
            .filter(|pages| *pages > 0.0)
    }
}

/// How a metric's percentiles turn into a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreRule {
    /// Score the p95.
    Percentile95,
    /// Score the median.
    Median,
    /// `100 - score(p5)`: low values are the unhealthy ones.
    InvertedP5,
    /// Inverted p5 against watermarks scaled by core count.
    TicketsPerCore,
    /// p95 connections as a percentage of RAM in MB.
    ConnectionsOfRam,
    /// p95 resident memory (GB) as a percentage of RAM.
    ResidentOfRam,
    /// p95 as a percentage of the configured WiredTiger cache.
    CacheShare,
    /// p95 pages per second relative to 5% of the cache in 4 KB pages.
    EvictedPages,
    /// `p95 / median`, only when p95 reaches 100.
    IopsDispersion,
    /// Worst per-sample `scan_objects / scan_keys` over the window.
    ScanRatio,
}

impl ScoreRule {
    /// Whether assessment rows show this metric as a percentage of a host
    /// resource rather than in its own unit.
    pub fn is_share(self) -> bool {
        matches!(self, ScoreRule::ResidentOfRam | ScoreRule::CacheShare)
    }
}

/// Per-device metric families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceMetric {
    /// `iops_<dev>`
    Iops,
    /// `disku_<dev>`
    Utilization,
}

impl DeviceMetric {
    /// Row label prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            DeviceMetric::Iops => "iops_",
            DeviceMetric::Utilization => "disku_",
        }
    }

    /// Label for a concrete device.
    pub fn label(self, device: &str) -> String {
        format!("{}{}", self.prefix(), device)
    }
}

/// Watermark configuration for one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreFormula {
    /// Metric name, or a `<dev>` template for device families.
    pub metric: String,
    /// Human readable description of what is scored.
    pub formula: &'static str,
    pub low: f64,
    pub high: f64,
    pub rule: ScoreRule,
}

impl ScoreFormula {
    fn new(metric: &str, formula: &'static str, low: f64, high: f64, rule: ScoreRule) -> Self {
        Self {
            metric: metric.to_string(),
            formula,
            low,
            high,
            rule,
        }
    }
}

/// The raw key/object scan windows needed by [`ScoreRule::ScanRatio`].
#[derive(Debug, Clone, Copy)]
pub struct ScanWindow<'a> {
    pub keys: &'a [DataPoint],
    pub objects: &'a [DataPoint],
}

impl<'a> ScanWindow<'a> {
    /// Slice the `scan_keys` and `scan_objects` series of the store to a
    /// window.
    pub fn from_store(data: &'a StoreData, from_ms: f64, to_ms: f64) -> Option<Self> {
        let keys = data.get("scan_keys")?;
        let objects = data.get("scan_objects")?;
        Some(Self {
            keys: window_slice(&keys.points, from_ms, to_ms),
            objects: window_slice(&objects.points, from_ms, to_ms),
        })
    }

    /// Largest objects-per-key ratio over samples that scanned keys.
    pub fn max_ratio(&self) -> Option<f64> {
        self.keys
            .iter()
            .zip(self.objects)
            .filter(|(k, _)| k.value > 0.0)
            .map(|(k, o)| o.value / k.value)
            .max_by(f64::total_cmp)
    }
}

const CATALOG_FORMULAS: &[(&str, &str, f64, f64, ScoreRule)] = &[
    ("conns_created/s", "median of conns_created/s", 0.0, 5.0, ScoreRule::Median),
    (
        "conns_current",
        "100 * (p95 of conns_current) / RAM in MB",
        5.0,
        20.0,
        ScoreRule::ConnectionsOfRam,
    ),
    ("cpu_idle", "100 - score(p5 of cpu_idle)", 50.0, 80.0, ScoreRule::InvertedP5),
    ("cpu_iowait", "p95 of cpu_iowait", 5.0, 15.0, ScoreRule::Percentile95),
    ("cpu_system", "p95 of cpu_system", 5.0, 15.0, ScoreRule::Percentile95),
    ("cpu_user", "p95 of cpu_user", 50.0, 70.0, ScoreRule::Percentile95),
    ("latency_command", "p95 of latency_command (ms)", 20.0, 100.0, ScoreRule::Percentile95),
    ("latency_read", "p95 of latency_read (ms)", 20.0, 100.0, ScoreRule::Percentile95),
    ("latency_write", "p95 of latency_write (ms)", 20.0, 100.0, ScoreRule::Percentile95),
    ("mem_page_faults", "p95 of mem_page_faults", 10.0, 20.0, ScoreRule::Percentile95),
    (
        "mem_resident",
        "100 * (p95 of mem_resident) / RAM",
        70.0,
        90.0,
        ScoreRule::ResidentOfRam,
    ),
    ("ops_command", "p95 of ops_command", 0.0, 64000.0, ScoreRule::Percentile95),
    ("ops_delete", "p95 of ops_delete", 0.0, 64000.0, ScoreRule::Percentile95),
    ("ops_getmore", "p95 of ops_getmore", 0.0, 64000.0, ScoreRule::Percentile95),
    ("ops_insert", "p95 of ops_insert", 0.0, 64000.0, ScoreRule::Percentile95),
    ("ops_query", "p95 of ops_query", 0.0, 64000.0, ScoreRule::Percentile95),
    ("ops_update", "p95 of ops_update", 0.0, 64000.0, ScoreRule::Percentile95),
    ("q_queued_read", "p95 of q_queued_read", 1.0, 5.0, ScoreRule::Percentile95),
    ("q_queued_write", "p95 of q_queued_write", 1.0, 5.0, ScoreRule::Percentile95),
    ("scan_keys", "p95 of scan_keys", 0.0, 1_048_576.0, ScoreRule::Percentile95),
    (
        "scan_objects",
        "max of scan_objects / scan_keys",
        2.0,
        5.0,
        ScoreRule::ScanRatio,
    ),
    ("scan_sort", "p95 of scan_sort", 0.0, 1000.0, ScoreRule::Percentile95),
    (
        "ticket_avail_read",
        "100 - score(p5 of ticket_avail_read), watermarks cores and 5 * cores",
        0.0,
        0.0,
        ScoreRule::TicketsPerCore,
    ),
    (
        "ticket_avail_write",
        "100 - score(p5 of ticket_avail_write), watermarks cores and 5 * cores",
        0.0,
        0.0,
        ScoreRule::TicketsPerCore,
    ),
    (
        "wt_cache_dirty",
        "100 * (p95 of wt_cache_dirty) / wt_cache_max",
        5.0,
        20.0,
        ScoreRule::CacheShare,
    ),
    (
        "wt_cache_used",
        "100 * (p95 of wt_cache_used) / wt_cache_max",
        80.0,
        95.0,
        ScoreRule::CacheShare,
    ),
    (
        "wt_dhandles_active",
        "p95 of wt_dhandles_active",
        16000.0,
        20000.0,
        ScoreRule::Percentile95,
    ),
    (
        "wt_modified_evicted",
        "(p95 of wt_modified_evicted) / (5% of wt_cache_max in 4KB pages)",
        5.0,
        10.0,
        ScoreRule::EvictedPages,
    ),
    (
        "wt_unmodified_evicted",
        "(p95 of wt_unmodified_evicted) / (5% of wt_cache_max in 4KB pages)",
        5.0,
        10.0,
        ScoreRule::EvictedPages,
    ),
];

/// Immutable scoring configuration for one host.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    facts: HostFacts,
    formulas: BTreeMap<String, ScoreFormula>,
    iops: ScoreFormula,
    utilization: ScoreFormula,
}

impl ScoringConfig {
    /// Bind every catalog metric to its rule, specializing the ticket
    /// watermarks to the host's core count.
    pub fn new(facts: HostFacts) -> Self {
        let cores = f64::from(facts.num_cores);
        let formulas = CATALOG_FORMULAS
            .iter()
            .map(|(metric, formula, low, high, rule)| {
                let (low, high) = match rule {
                    ScoreRule::TicketsPerCore => (cores, 5.0 * cores),
                    _ => (*low, *high),
                };
                (
                    metric.to_string(),
                    ScoreFormula::new(metric, formula, low, high, *rule),
                )
            })
            .collect();

        Self {
            facts,
            formulas,
            iops: ScoreFormula::new(
                "iops_<dev>",
                "(p95 of iops_<dev>) / (median of iops_<dev>)",
                2.0,
                4.0,
                ScoreRule::IopsDispersion,
            ),
            utilization: ScoreFormula::new(
                "disku_<dev>",
                "p95 of disku_<dev>",
                50.0,
                90.0,
                ScoreRule::Percentile95,
            ),
        }
    }

    /// The host facts this config was built from.
    pub fn facts(&self) -> &HostFacts {
        &self.facts
    }

    /// Formula bound to a catalog metric, if it is scored at all.
    pub fn formula(&self, metric: &str) -> Option<&ScoreFormula> {
        self.formulas.get(metric)
    }

    /// Formula for a device family.
    pub fn device_formula(&self, metric: DeviceMetric) -> &ScoreFormula {
        match metric {
            DeviceMetric::Iops => &self.iops,
            DeviceMetric::Utilization => &self.utilization,
        }
    }

    /// Every formula, catalog and device templates, sorted by metric name.
    pub fn formulas(&self) -> Vec<&ScoreFormula> {
        let mut all: Vec<&ScoreFormula> = self.formulas.values().collect();
        all.push(&self.iops);
        all.push(&self.utilization);
        all.sort_by(|a, b| a.metric.cmp(&b.metric));
        all
    }

    /// Score a catalog metric. Metrics without a formula are not evaluable.
    pub fn score(&self, metric: &str, p: &Percentiles, scan: Option<&ScanWindow<'_>>) -> i32 {
        match self.formulas.get(metric) {
            Some(formula) => self.evaluate(formula, p, scan),
            None => NOT_EVALUABLE,
        }
    }

    /// Score one device metric.
    pub fn score_device(&self, metric: DeviceMetric, p: &Percentiles) -> i32 {
        self.evaluate(self.device_formula(metric), p, None)
    }

    /// Express a value as the percentage of the host resource its rule
    /// normalizes against. `None` for rules that are not shares or when the
    /// denominator is unknown.
    pub fn as_share(&self, rule: ScoreRule, value: f64) -> Option<f64> {
        let denominator = match rule {
            ScoreRule::ResidentOfRam => self.facts.mem_size_gb()?,
            ScoreRule::CacheShare => self.facts.max_wt_cache()?,
            _ => return None,
        };
        Some(100.0 * value / denominator)
    }

    fn evaluate(&self, f: &ScoreFormula, p: &Percentiles, scan: Option<&ScanWindow<'_>>) -> i32 {
        if p.is_missing() {
            return NOT_EVALUABLE;
        }
        let by_range = |v: f64| score_by_range(v, f.low, f.high);

        match f.rule {
            ScoreRule::Percentile95 => by_range(p.p95),
            ScoreRule::Median => by_range(p.median),
            ScoreRule::InvertedP5 => 100 - by_range(p.p5),
            ScoreRule::TicketsPerCore => {
                if self.facts.num_cores == 0 {
                    NOT_EVALUABLE
                } else {
                    100 - by_range(p.p5)
                }
            }
            ScoreRule::ConnectionsOfRam => match self.facts.mem_size_mb {
                0 => NOT_EVALUABLE,
                mb => by_range(100.0 * p.p95 / mb as f64),
            },
            ScoreRule::ResidentOfRam | ScoreRule::CacheShare => {
                match self.as_share(f.rule, p.p95) {
                    Some(share) => by_range(share),
                    None => NOT_EVALUABLE,
                }
            }
            ScoreRule::EvictedPages => match self.facts.eviction_pages() {
                Some(pages) => by_range(p.p95 / pages),
                None => NOT_EVALUABLE,
            },
            ScoreRule::IopsDispersion => {
                if p.p95 < 100.0 {
                    NOT_EVALUABLE
                } else {
                    by_range(p.p95 / p.median)
                }
            }
            ScoreRule::ScanRatio => {
                if p.p95 < 1000.0 {
                    return 100;
                }
                scan.and_then(ScanWindow::max_ratio)
                    .map(by_range)
                    .unwrap_or(100)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(p5: f64, median: f64, p95: f64) -> Percentiles {
        Percentiles { p5, median, p95 }
    }

    fn config() -> ScoringConfig {
        ScoringConfig::new(HostFacts {
            num_cores: 8,
            mem_size_mb: 16 * 1024,
            max_wt_cache_gb: 8.0,
        })
    }

    #[test]
    fn test_score_by_range_watermarks() {
        assert_eq!(score_by_range(40.0, 50.0, 80.0), 100);
        assert_eq!(score_by_range(65.0, 50.0, 80.0), 50);
        assert_eq!(score_by_range(95.0, 50.0, 80.0), 0);
        assert_eq!(score_by_range(f64::NAN, 50.0, 80.0), NOT_EVALUABLE);
    }

    #[test]
    fn test_score_by_range_bounded_and_monotonic() {
        let mut last = 100;
        for i in 0..=200 {
            let s = score_by_range(f64::from(i), 50.0, 150.0);
            assert!((0..=100).contains(&s));
            assert!(s <= last);
            last = s;
        }
    }

    #[test]
    fn test_cpu_idle_starvation_scores_zero() {
        let cfg = config();
        assert_eq!(cfg.score("cpu_idle", &p(10.0, 40.0, 90.0), None), 0);
        assert_eq!(cfg.score("cpu_idle", &p(90.0, 95.0, 99.0), None), 100);
    }

    #[test]
    fn test_missing_metric_and_missing_data() {
        let cfg = config();
        assert_eq!(cfg.score("net_in", &p(1.0, 1.0, 1.0), None), NOT_EVALUABLE);
        assert_eq!(
            cfg.score("cpu_user", &Percentiles::MISSING, None),
            NOT_EVALUABLE
        );
    }

    #[test]
    fn test_normalized_metrics_need_denominators() {
        let unknown = ScoringConfig::new(HostFacts::default());
        let values = p(1.0, 1.0, 1.0);
        for metric in [
            "conns_current",
            "mem_resident",
            "wt_cache_used",
            "wt_cache_dirty",
            "wt_modified_evicted",
            "ticket_avail_read",
        ] {
            assert_eq!(unknown.score(metric, &values, None), NOT_EVALUABLE, "{metric}");
        }
    }

    #[test]
    fn test_cache_share() {
        let cfg = config();
        // 7.2 of 8 GB = 90%, between 80 and 95
        assert_eq!(cfg.score("wt_cache_used", &p(0.0, 0.0, 7.2), None), 33);
        assert_eq!(cfg.as_share(ScoreRule::CacheShare, 4.0), Some(50.0));
        assert_eq!(cfg.as_share(ScoreRule::Percentile95, 4.0), None);
    }

    #[test]
    fn test_ticket_watermarks_scale_with_cores() {
        let cfg = config();
        let f = cfg.formula("ticket_avail_read").map(|f| (f.low, f.high));
        assert_eq!(f, Some((8.0, 40.0)));
        // Plenty of tickets available is healthy.
        assert_eq!(cfg.score("ticket_avail_read", &p(128.0, 128.0, 128.0), None), 100);
        assert_eq!(cfg.score("ticket_avail_read", &p(2.0, 128.0, 128.0), None), 0);
    }

    #[test]
    fn test_iops_dispersion_needs_volume() {
        let cfg = config();
        assert_eq!(
            cfg.score_device(DeviceMetric::Iops, &p(1.0, 10.0, 50.0)),
            NOT_EVALUABLE
        );
        assert_eq!(cfg.score_device(DeviceMetric::Iops, &p(1.0, 100.0, 150.0)), 100);
        assert_eq!(cfg.score_device(DeviceMetric::Iops, &p(1.0, 100.0, 500.0)), 0);
    }

    #[test]
    fn test_scan_ratio_uses_worst_sample() {
        let cfg = config();
        let keys = vec![
            DataPoint::new(0.0, 1.0),
            DataPoint::new(100.0, 2.0),
            DataPoint::new(100.0, 3.0),
        ];
        let objects = vec![
            DataPoint::new(50.0, 1.0),
            DataPoint::new(200.0, 2.0),
            DataPoint::new(350.0, 3.0),
        ];
        let scan = ScanWindow {
            keys: &keys,
            objects: &objects,
        };
        assert_eq!(scan.max_ratio(), Some(3.5));
        assert_eq!(cfg.score("scan_objects", &p(0.0, 0.0, 5000.0), Some(&scan)), 50);
        assert_eq!(cfg.score("scan_objects", &p(0.0, 0.0, 10.0), Some(&scan)), 100);
    }

    #[test]
    fn test_evicted_pages_relative_to_cache() {
        let cfg = config();
        // 5% of 8 GB in 4 KB pages
        let pages = 0.05 * 8.0 * GB / 4096.0;
        assert_eq!(
            cfg.score("wt_modified_evicted", &p(0.0, 0.0, 7.33 * pages), None),
            53
        );
    }

    #[test]
    fn test_formulas_sorted_and_complete() {
        let cfg = config();
        let names: Vec<&str> = cfg.formulas().iter().map(|f| f.metric.as_str()).collect();
        assert_eq!(names.len(), CATALOG_FORMULAS.len() + 2);
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
        assert!(names.contains(&"iops_<dev>"));
    }
}
