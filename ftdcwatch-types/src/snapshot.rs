//! Typed snapshots projected from one decoded FTDC sample.
//!
//! A snapshot is the structured view of a single sample index. Every field
//! defaults to zero: a counter the server did not report is indistinguishable
//! from one that reads zero, which is what lets older and newer server
//! versions share one extraction path.

use std::collections::BTreeMap;

/// `serverStatus` counters for one sample.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServerStatus {
    /// `localTime`, milliseconds since the Unix epoch.
    pub local_time_ms: i64,
    /// Seconds since the process started. Used to detect restarts.
    pub uptime: u64,
    pub mem: Memory,
    pub connections: Connections,
    pub network: Network,
    pub extra_info: ExtraInfo,
    pub global_lock: GlobalLock,
    pub op_counters: OpCounters,
    pub op_latencies: OpLatencies,
    pub query_executor: QueryExecutor,
    /// `metrics.operation.scanAndOrder`.
    pub scan_and_order: u64,
    pub wired_tiger: WiredTiger,
}

/// `serverStatus.mem`, in megabytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Memory {
    pub resident: u64,
    pub r#virtual: u64,
}

/// `serverStatus.connections`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Connections {
    pub current: u64,
    pub available: u64,
    pub total_created: u64,
    pub active: u64,
}

/// `serverStatus.network`, cumulative byte and request counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Network {
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub num_requests: u64,
    pub physical_bytes_in: u64,
    pub physical_bytes_out: u64,
}

/// `serverStatus.extra_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtraInfo {
    pub page_faults: u64,
}

/// Reader/writer pair used by `globalLock.activeClients` and `currentQueue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadersWriters {
    pub readers: u64,
    pub writers: u64,
}

/// `serverStatus.globalLock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GlobalLock {
    pub active_clients: ReadersWriters,
    pub current_queue: ReadersWriters,
}

/// `serverStatus.opcounters`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpCounters {
    pub command: u64,
    pub delete: u64,
    pub getmore: u64,
    pub insert: u64,
    pub query: u64,
    pub update: u64,
}

/// Cumulative latency (microseconds) and operation count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LatencyCounter {
    pub latency: u64,
    pub ops: u64,
}

impl LatencyCounter {
    /// Average latency in milliseconds, or zero when no operations ran.
    pub fn average_ms(&self) -> f64 {
        if self.ops == 0 {
            0.0
        } else {
            self.latency as f64 / self.ops as f64 / 1000.0
        }
    }
}

/// `serverStatus.opLatencies`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpLatencies {
    pub commands: LatencyCounter,
    pub reads: LatencyCounter,
    pub writes: LatencyCounter,
}

/// `serverStatus.metrics.queryExecutor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryExecutor {
    pub scanned: u64,
    pub scanned_objects: u64,
}

/// The WiredTiger counters the engine derives series from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WiredTiger {
    pub block_manager: BlockManager,
    pub cache: WiredTigerCache,
    /// `data-handle.connection data handles currently active`.
    pub active_data_handles: u64,
    /// `concurrentTransactions.read.available`.
    pub read_tickets_available: u64,
    /// `concurrentTransactions.write.available`.
    pub write_tickets_available: u64,
}

/// `wiredTiger.block-manager`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockManager {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub bytes_written_for_checkpoint: u64,
}

/// `wiredTiger.cache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WiredTigerCache {
    pub bytes_in_cache: u64,
    pub max_bytes_configured: u64,
    pub tracked_dirty_bytes: u64,
    pub modified_pages_evicted: u64,
    pub unmodified_pages_evicted: u64,
    pub bytes_read_into_cache: u64,
    pub bytes_written_from_cache: u64,
}

/// `systemMetrics` counters for one sample.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SystemMetrics {
    /// Sample time, milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// Server uptime at the same sample, carried so restarts can be detected.
    pub uptime: u64,
    pub cpu: CpuCounters,
    /// Per-device counters keyed by device name.
    pub disks: BTreeMap<String, DiskCounters>,
}

/// Cumulative CPU time counters in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuCounters {
    pub idle_ms: u64,
    pub iowait_ms: u64,
    pub nice_ms: u64,
    pub softirq_ms: u64,
    pub steal_ms: u64,
    pub system_ms: u64,
    pub user_ms: u64,
}

impl CpuCounters {
    /// Sum of all CPU time buckets.
    pub fn total_ms(&self) -> u64 {
        self.idle_ms
            + self.iowait_ms
            + self.nice_ms
            + self.softirq_ms
            + self.steal_ms
            + self.system_ms
            + self.user_ms
    }
}

/// Cumulative counters for one disk device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiskCounters {
    pub reads: u64,
    pub writes: u64,
    pub read_time_ms: u64,
    pub write_time_ms: u64,
    pub io_in_progress: u64,
    pub io_queued_ms: u64,
    pub io_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_latency_is_zero_without_ops() {
        let c = LatencyCounter { latency: 5000, ops: 0 };
        assert_eq!(c.average_ms(), 0.0);
    }

    #[test]
    fn average_latency_converts_micros_to_millis() {
        let c = LatencyCounter {
            latency: 50_000,
            ops: 10,
        };
        assert_eq!(c.average_ms(), 5.0);
    }

    #[test]
    fn cpu_total_sums_all_buckets() {
        let cpu = CpuCounters {
            idle_ms: 1,
            iowait_ms: 2,
            nice_ms: 3,
            softirq_ms: 4,
            steal_ms: 5,
            system_ms: 6,
            user_ms: 7,
        };
        assert_eq!(cpu.total_ms(), 28);
    }
}
