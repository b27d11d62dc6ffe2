//! Derivation of named time series from ordered snapshots.
//!
//! Four independent passes turn one host's snapshots into series:
//!
//! - `serverStatus`: memory, connections, latency, network, op counters,
//!   queues and scans
//! - WiredTiger: block manager, cache, eviction, data handles, tickets
//! - `systemMetrics`: CPU percentages and per-device disk statistics
//! - replication: per-member lag behind the primary
//!
//! [`derive`] runs the passes on four scoped threads and joins them before
//! returning, so callers only ever see a complete [`DerivedSeries`].

use std::collections::BTreeMap;
use std::thread;

use ftdcwatch_types::{
    DataPoint, DiskSeriesKind, DiskStats, DiskStatsMap, MemberState, ReplMember, ReplSetStatus,
    ServerStatus, SystemMetrics, TimeSeries, GB, MB,
};

use crate::catalog::{
    REPLICATION_METRICS, SERVER_STATUS_METRICS, SYSTEM_METRICS, WIRED_TIGER_METRICS,
};

/// Series keyed by name.
pub type SeriesMap = BTreeMap<String, TimeSeries>;

/// Snapshots for one host, in sample order.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSet {
    pub server_status: Vec<ServerStatus>,
    pub system_metrics: Vec<SystemMetrics>,
    pub repl_status: Vec<ReplSetStatus>,
}

impl SnapshotSet {
    /// Check whether no snapshots of any kind were collected.
    pub fn is_empty(&self) -> bool {
        self.server_status.is_empty()
            && self.system_metrics.is_empty()
            && self.repl_status.is_empty()
    }
}

/// Output of all four derivation passes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedSeries {
    /// Catalog series by name.
    pub series: SeriesMap,
    /// Per-device disk statistics.
    pub disks: DiskStatsMap,
    /// Per-member replication lag, keyed by member label.
    pub replication_lags: SeriesMap,
}

impl DerivedSeries {
    /// Total number of points across every series.
    pub fn point_count(&self) -> usize {
        let disks: usize = self
            .disks
            .values()
            .flat_map(|d| DiskSeriesKind::ALL.iter().map(move |k| d.series(*k).len()))
            .sum();
        self.series.values().map(TimeSeries::len).sum::<usize>()
            + self.replication_lags.values().map(TimeSeries::len).sum::<usize>()
            + disks
    }

    /// Earliest and latest timestamp across the catalog series.
    pub fn time_bounds(&self) -> Option<(f64, f64)> {
        time_bounds(&self.series)
    }
}

/// Earliest and latest timestamp across every series in `map`.
pub fn time_bounds(map: &SeriesMap) -> Option<(f64, f64)> {
    let first = map
        .values()
        .filter_map(TimeSeries::first_timestamp)
        .min_by(f64::total_cmp)?;
    let last = map
        .values()
        .filter_map(TimeSeries::last_timestamp)
        .max_by(f64::total_cmp)?;
    Some((first, last))
}

/// Run all derivation passes concurrently and join them.
pub fn derive(snapshots: &SnapshotSet) -> DerivedSeries {
    let (server, wired_tiger, (system, disks), (replication, replication_lags)) =
        thread::scope(|s| {
            let server = s.spawn(|| server_status_series(&snapshots.server_status));
            let wired_tiger = s.spawn(|| wired_tiger_series(&snapshots.server_status));
            let system = s.spawn(|| system_metrics_series(&snapshots.system_metrics));
            let replication = s.spawn(|| replication_series(&snapshots.repl_status));

            (
                join(server),
                join(wired_tiger),
                join(system),
                join(replication),
            )
        });

    let mut series = server;
    series.extend(wired_tiger);
    series.extend(system);
    series.extend(replication);

    DerivedSeries {
        series,
        disks,
        replication_lags,
    }
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

fn registered(names: &[&str]) -> SeriesMap {
    names
        .iter()
        .map(|name| (name.to_string(), TimeSeries::new(*name)))
        .collect()
}

fn push(map: &mut SeriesMap, name: &str, value: f64, t: f64) {
    if let Some(series) = map.get_mut(name) {
        series.push(DataPoint::non_negative(value, t));
    }
}

/// Counter delta; a counter that went backwards yields zero.
fn delta(current: u64, previous: u64) -> f64 {
    current.saturating_sub(previous) as f64
}

/// Elapsed whole seconds between samples, never less than one.
fn elapsed_seconds(current_ms: i64, previous_ms: i64) -> f64 {
    (current_ms.saturating_sub(previous_ms) as f64 / 1000.0)
        .round()
        .max(1.0)
}

/// Derive the `serverStatus` family.
///
/// Gauges are emitted for every sample whose uptime increased; rates need a
/// previous sample as well. A sample whose uptime did not increase marks a
/// restart and is skipped entirely, but still becomes the baseline for the
/// next sample.
pub fn server_status_series(stats: &[ServerStatus]) -> SeriesMap {
    let mut map = registered(SERVER_STATUS_METRICS);
    let mut prev = ServerStatus::default();

    for (i, stat) in stats.iter().enumerate() {
        if stat.uptime > prev.uptime {
            let t = stat.local_time_ms as f64;
            let m = &mut map;

            push(m, "mem_resident", stat.mem.resident as f64 / 1024.0, t);
            push(m, "mem_virtual", stat.mem.r#virtual as f64 / 1024.0, t);
            push(m, "conns_active", stat.connections.active as f64, t);
            push(m, "conns_available", stat.connections.available as f64, t);
            push(m, "conns_current", stat.connections.current as f64, t);
            push(m, "latency_read", stat.op_latencies.reads.average_ms(), t);
            push(m, "latency_write", stat.op_latencies.writes.average_ms(), t);
            push(m, "latency_command", stat.op_latencies.commands.average_ms(), t);

            let lock = &stat.global_lock;
            push(m, "q_active_read", lock.active_clients.readers as f64, t);
            push(m, "q_active_write", lock.active_clients.writers as f64, t);
            push(m, "q_queued_read", lock.current_queue.readers as f64, t);
            push(m, "q_queued_write", lock.current_queue.writers as f64, t);

            if i > 0 {
                let secs = elapsed_seconds(stat.local_time_ms, prev.local_time_ms);
                let rate = |cur: u64, before: u64| delta(cur, before) / secs;
                let mb_rate = |cur: u64, before: u64| delta(cur, before) / MB / secs;
                let (net, pnet) = (&stat.network, &prev.network);
                let (ops, pops) = (&stat.op_counters, &prev.op_counters);
                let (qe, pqe) = (&stat.query_executor, &prev.query_executor);

                push(
                    m,
                    "mem_page_faults",
                    rate(stat.extra_info.page_faults, prev.extra_info.page_faults),
                    t,
                );
                push(
                    m,
                    "conns_created/s",
                    rate(
                        stat.connections.total_created,
                        prev.connections.total_created,
                    ),
                    t,
                );
                push(m, "net_in", mb_rate(net.bytes_in, pnet.bytes_in), t);
                push(m, "net_out", mb_rate(net.bytes_out, pnet.bytes_out), t);
                push(m, "net_requests", rate(net.num_requests, pnet.num_requests), t);
                push(
                    m,
                    "net_physical_in",
                    mb_rate(net.physical_bytes_in, pnet.physical_bytes_in),
                    t,
                );
                push(
                    m,
                    "net_physical_out",
                    mb_rate(net.physical_bytes_out, pnet.physical_bytes_out),
                    t,
                );
                push(m, "ops_query", rate(ops.query, pops.query), t);
                push(m, "ops_insert", rate(ops.insert, pops.insert), t);
                push(m, "ops_update", rate(ops.update, pops.update), t);
                push(m, "ops_delete", rate(ops.delete, pops.delete), t);
                push(m, "ops_getmore", rate(ops.getmore, pops.getmore), t);
                push(m, "ops_command", rate(ops.command, pops.command), t);
                push(m, "scan_keys", rate(qe.scanned, pqe.scanned), t);
                push(m, "scan_objects", rate(qe.scanned_objects, pqe.scanned_objects), t);
                push(m, "scan_sort", rate(stat.scan_and_order, prev.scan_and_order), t);
            }
        }
        prev = stat.clone();
    }

    map
}

/// Derive the WiredTiger family. Same restart handling as
/// [`server_status_series`].
pub fn wired_tiger_series(stats: &[ServerStatus]) -> SeriesMap {
    let mut map = registered(WIRED_TIGER_METRICS);
    let mut prev = ServerStatus::default();

    for (i, stat) in stats.iter().enumerate() {
        if stat.uptime > prev.uptime {
            let t = stat.local_time_ms as f64;
            let m = &mut map;
            let wt = &stat.wired_tiger;

            push(m, "wt_cache_max", wt.cache.max_bytes_configured as f64 / GB, t);
            push(m, "wt_cache_used", wt.cache.bytes_in_cache as f64 / GB, t);
            push(m, "wt_cache_dirty", wt.cache.tracked_dirty_bytes as f64 / GB, t);
            push(m, "wt_dhandles_active", wt.active_data_handles as f64, t);
            push(m, "ticket_avail_read", wt.read_tickets_available as f64, t);
            push(m, "ticket_avail_write", wt.write_tickets_available as f64, t);

            if i > 0 {
                let secs = elapsed_seconds(stat.local_time_ms, prev.local_time_ms);
                let rate = |cur: u64, before: u64| delta(cur, before) / secs;
                let mb_rate = |cur: u64, before: u64| delta(cur, before) / MB / secs;
                let (bm, pbm) = (&wt.block_manager, &prev.wired_tiger.block_manager);
                let (cache, pcache) = (&wt.cache, &prev.wired_tiger.cache);

                push(m, "wt_blkmgr_read", mb_rate(bm.bytes_read, pbm.bytes_read), t);
                push(
                    m,
                    "wt_blkmgr_written",
                    mb_rate(bm.bytes_written, pbm.bytes_written),
                    t,
                );
                push(
                    m,
                    "wt_blkmgr_written_checkpoint",
                    mb_rate(
                        bm.bytes_written_for_checkpoint,
                        pbm.bytes_written_for_checkpoint,
                    ),
                    t,
                );
                push(
                    m,
                    "wt_modified_evicted",
                    rate(cache.modified_pages_evicted, pcache.modified_pages_evicted),
                    t,
                );
                push(
                    m,
                    "wt_unmodified_evicted",
                    rate(
                        cache.unmodified_pages_evicted,
                        pcache.unmodified_pages_evicted,
                    ),
                    t,
                );
                push(
                    m,
                    "wt_cache_read_in",
                    mb_rate(cache.bytes_read_into_cache, pcache.bytes_read_into_cache),
                    t,
                );
                push(
                    m,
                    "wt_cache_written_from",
                    mb_rate(
                        cache.bytes_written_from_cache,
                        pcache.bytes_written_from_cache,
                    ),
                    t,
                );
            }
        }
        prev = stat.clone();
    }

    map
}

/// Derive CPU percentages and per-device disk statistics.
///
/// CPU metrics are shares of the total CPU time elapsed between samples
/// rather than of wall time. A step is skipped when uptime did not increase
/// or no CPU time elapsed; a device is skipped when the previous sample did
/// not report it.
pub fn system_metrics_series(stats: &[SystemMetrics]) -> (SeriesMap, DiskStatsMap) {
    let mut map = registered(SYSTEM_METRICS);
    let mut disks = DiskStatsMap::new();

    for pair in stats.windows(2) {
        let (prev, stat) = (&pair[0], &pair[1]);
        if stat.uptime <= prev.uptime {
            continue;
        }
        let t = stat.timestamp_ms as f64;

        let total = delta(stat.cpu.total_ms(), prev.cpu.total_ms());
        if total > 0.0 {
            let pct = |cur: u64, before: u64| 100.0 * delta(cur, before) / total;
            let (cpu, pcpu) = (&stat.cpu, &prev.cpu);
            let m = &mut map;
            push(m, "cpu_idle", pct(cpu.idle_ms, pcpu.idle_ms), t);
            push(m, "cpu_iowait", pct(cpu.iowait_ms, pcpu.iowait_ms), t);
            push(m, "cpu_nice", pct(cpu.nice_ms, pcpu.nice_ms), t);
            push(m, "cpu_softirq", pct(cpu.softirq_ms, pcpu.softirq_ms), t);
            push(m, "cpu_steal", pct(cpu.steal_ms, pcpu.steal_ms), t);
            push(m, "cpu_system", pct(cpu.system_ms, pcpu.system_ms), t);
            push(m, "cpu_user", pct(cpu.user_ms, pcpu.user_ms), t);
        }

        let secs = stat.timestamp_ms.saturating_sub(prev.timestamp_ms) as f64 / 1000.0;
        for (device, disk) in &stat.disks {
            let Some(pdisk) = prev.disks.get(device) else {
                continue;
            };
            let iops = if secs > 0.0 {
                delta(disk.reads + disk.writes, pdisk.reads + pdisk.writes) / secs
            } else {
                0.0
            };
            let device_stats = disks
                .entry(device.clone())
                .or_insert_with(|| DiskStats::new(device));

            let point = |v: f64| DataPoint::non_negative(v, t);
            device_stats
                .utilization
                .push(point(100.0 * delta(disk.io_time_ms, pdisk.io_time_ms) / 1000.0));
            device_stats.iops.push(point(iops));
            device_stats
                .queue_length
                .push(point(disk.io_in_progress as f64));
            device_stats
                .read_time_ms
                .push(point(delta(disk.read_time_ms, pdisk.read_time_ms)));
            device_stats
                .write_time_ms
                .push(point(delta(disk.write_time_ms, pdisk.write_time_ms)));
            device_stats
                .io_queued_ms
                .push(point(delta(disk.io_queued_ms, pdisk.io_queued_ms)));
        }
    }

    (map, disks)
}

/// Derive per-member replication lag.
///
/// Members are identified by position after sorting by name. The position
/// to name mapping is rebuilt on the first status document and whenever the
/// member count changes. Status documents without a primary are skipped.
/// Series are labelled with the short member name unless two members share
/// it, in which case those members keep their full name.
pub fn replication_series(statuses: &[ReplSetStatus]) -> (SeriesMap, SeriesMap) {
    let map = registered(REPLICATION_METRICS);
    let mut lags = SeriesMap::new();
    let mut hosts: Vec<String> = Vec::new();

    for status in statuses {
        if status.members.is_empty() {
            continue;
        }
        let mut members = status.members.clone();
        members.sort_by(|a, b| a.name.cmp(&b.name));

        if hosts.len() != members.len() {
            hosts = member_labels(&members);
            for host in &hosts {
                lags.entry(host.clone())
                    .or_insert_with(|| TimeSeries::new(host.as_str()));
            }
            tracing::debug!(members = ?hosts, "Replica set membership resynced");
        }

        let Some(primary) = status.primary_optime() else {
            continue;
        };
        let t = status.date_ms as f64;

        for (host, member) in hosts.iter().zip(&members) {
            let lag = match member.state {
                MemberState::Primary => 0,
                MemberState::Secondary => (primary - member.optime_secs).max(0),
                MemberState::Arbiter => continue,
                MemberState::Other(_) => 0,
            };
            if let Some(series) = lags.get_mut(host) {
                series.push(DataPoint::non_negative(lag as f64, t));
            }
        }
    }

    (map, lags)
}

/// One label per member, in member order.
fn member_labels(members: &[ReplMember]) -> Vec<String> {
    let short: Vec<String> = members.iter().map(ReplMember::short_name).collect();
    short
        .iter()
        .zip(members)
        .map(|(name, member)| {
            if short.iter().filter(|other| *other == name).count() > 1 {
                member.name.clone()
            } else {
                name.clone()
            }
        })
        .collect()
}
