//! Metric catalog: the names of every derived series.
//!
//! Names are grouped by the derivation pass that produces them. Every name
//! listed here exists in the store (possibly empty) as soon as one file has
//! been ingested, so dashboards can enumerate targets before data arrives.

use ftdcwatch_types::DiskSeriesKind;

/// Series derived from `serverStatus` counters.
pub const SERVER_STATUS_METRICS: &[&str] = &[
    "mem_resident",
    "mem_virtual",
    "mem_page_faults",
    "conns_active",
    "conns_available",
    "conns_current",
    "conns_created/s",
    "latency_read",
    "latency_write",
    "latency_command",
    "net_in",
    "net_out",
    "net_requests",
    "net_physical_in",
    "net_physical_out",
    "ops_query",
    "ops_insert",
    "ops_update",
    "ops_delete",
    "ops_getmore",
    "ops_command",
    "q_active_read",
    "q_active_write",
    "q_queued_read",
    "q_queued_write",
    "scan_keys",
    "scan_objects",
    "scan_sort",
];

/// Series derived from `serverStatus.wiredTiger` counters.
pub const WIRED_TIGER_METRICS: &[&str] = &[
    "wt_blkmgr_read",
    "wt_blkmgr_written",
    "wt_blkmgr_written_checkpoint",
    "wt_cache_max",
    "wt_cache_used",
    "wt_cache_dirty",
    "wt_modified_evicted",
    "wt_unmodified_evicted",
    "wt_cache_read_in",
    "wt_cache_written_from",
    "wt_dhandles_active",
    "ticket_avail_read",
    "ticket_avail_write",
];

/// Series derived from `systemMetrics`. The disk entries are fan-out
/// targets that expand to one series per device.
pub const SYSTEM_METRICS: &[&str] = &[
    "cpu_idle",
    "cpu_iowait",
    "cpu_nice",
    "cpu_softirq",
    "cpu_steal",
    "cpu_system",
    "cpu_user",
    "disks_utils",
    "disks_iops",
    "io_in_progress",
    "read_time_ms",
    "write_time_ms",
    "io_queued_ms",
];

/// Series derived from `replSetGetStatus`. Expands to one series per member.
pub const REPLICATION_METRICS: &[&str] = &[REPLICATION_LAGS];

/// Fan-out target for per-member replication lag.
pub const REPLICATION_LAGS: &str = "replication_lags";

/// Name of the WiredTiger cache size series used to normalize cache scores.
pub const WT_CACHE_MAX: &str = "wt_cache_max";

/// Map a fan-out target to the per-device series it expands to.
pub fn disk_target(target: &str) -> Option<DiskSeriesKind> {
    match target {
        "disks_utils" => Some(DiskSeriesKind::Utilization),
        "disks_iops" => Some(DiskSeriesKind::Iops),
        "disks_queue_length" => Some(DiskSeriesKind::QueueLength),
        "read_time_ms" => Some(DiskSeriesKind::ReadTimeMs),
        "write_time_ms" => Some(DiskSeriesKind::WriteTimeMs),
        "io_queued_ms" => Some(DiskSeriesKind::IoQueuedMs),
        _ => None,
    }
}

/// Iterate over every catalog name, in pass order.
pub fn all_metrics() -> impl Iterator<Item = &'static str> {
    SERVER_STATUS_METRICS
        .iter()
        .chain(WIRED_TIGER_METRICS)
        .chain(SYSTEM_METRICS)
        .chain(REPLICATION_METRICS)
        .copied()
}

const SHORT_LABEL_PREFIXES: &[&str] = &[
    "conns_",
    "cpu_",
    "latency_",
    "mem_",
    "net_",
    "ops_",
    "q_active_",
    "q_queued_",
    "scan_",
    "ticket_",
    "wt_blkmgr_",
    "wt_cache_",
    "wt_dhandles_",
];

/// Strip the family prefix from a series name for chart legends.
///
/// `wt_modified_evicted` becomes `modified`; names outside any family are
/// returned unchanged.
pub fn short_label(name: &str) -> &str {
    if let Some(rest) = SHORT_LABEL_PREFIXES
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
    {
        return rest;
    }
    match name.strip_prefix("wt_") {
        Some(rest) => rest.strip_suffix("_evicted").unwrap_or(rest),
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_labels() {
        assert_eq!(short_label("conns_created/s"), "created/s");
        assert_eq!(short_label("q_queued_read"), "read");
        assert_eq!(short_label("wt_cache_dirty"), "dirty");
        assert_eq!(short_label("wt_blkmgr_written_checkpoint"), "written_checkpoint");
        assert_eq!(short_label("wt_unmodified_evicted"), "unmodified");
        assert_eq!(short_label("replication_lags"), "replication_lags");
    }

    #[test]
    fn test_disk_targets() {
        assert_eq!(disk_target("disks_iops"), Some(DiskSeriesKind::Iops));
        assert_eq!(
            disk_target("disks_queue_length"),
            Some(DiskSeriesKind::QueueLength)
        );
        assert_eq!(disk_target("cpu_idle"), None);
    }

    #[test]
    fn test_catalog_names_are_unique() {
        let mut names: Vec<_> = all_metrics().collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
