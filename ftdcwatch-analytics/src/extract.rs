//! Projection of decoded sample arrays into typed snapshots.
//!
//! A decoded batch is a map from slash-separated metric path to one value per
//! sample. [`AttributeExtractor`] reads index `i` out of every recognized path
//! and assembles a [`ServerStatus`] or [`SystemMetrics`]. A path the server
//! did not report, or an index past the end of its array, reads as zero.

use std::collections::{BTreeMap, HashMap};

use ftdcwatch_types::{
    BlockManager, Connections, CpuCounters, DiskCounters, ExtraInfo, GlobalLock, LatencyCounter,
    Memory, Network, OpCounters, OpLatencies, QueryExecutor, ReadersWriters, ServerStatus,
    SystemMetrics, WiredTiger, WiredTigerCache,
};

/// Decoded metric arrays keyed by slash-separated path.
pub type MetricArrays = HashMap<String, Vec<u64>>;

const DISK_PREFIX: &str = "systemMetrics/disks/";

/// Per-device counter a disk path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiskField {
    Reads,
    Writes,
    ReadTimeMs,
    WriteTimeMs,
    IoInProgress,
    IoQueuedMs,
    IoTimeMs,
}

impl DiskField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "reads" => Some(DiskField::Reads),
            "writes" => Some(DiskField::Writes),
            "read_time_ms" => Some(DiskField::ReadTimeMs),
            "write_time_ms" => Some(DiskField::WriteTimeMs),
            "io_in_progress" => Some(DiskField::IoInProgress),
            "io_queued_ms" => Some(DiskField::IoQueuedMs),
            "io_time_ms" => Some(DiskField::IoTimeMs),
            _ => None,
        }
    }

    fn set(self, counters: &mut DiskCounters, value: u64) {
        match self {
            DiskField::Reads => counters.reads = value,
            DiskField::Writes => counters.writes = value,
            DiskField::ReadTimeMs => counters.read_time_ms = value,
            DiskField::WriteTimeMs => counters.write_time_ms = value,
            DiskField::IoInProgress => counters.io_in_progress = value,
            DiskField::IoQueuedMs => counters.io_queued_ms = value,
            DiskField::IoTimeMs => counters.io_time_ms = value,
        }
    }
}

/// A disk path discovered in the batch.
#[derive(Debug)]
struct DiskPath<'a> {
    path: &'a str,
    device: &'a str,
    field: DiskField,
}

/// Reads typed snapshots out of one decoded batch.
#[derive(Debug)]
pub struct AttributeExtractor<'a> {
    metrics: &'a MetricArrays,
    disks: Vec<DiskPath<'a>>,
}

impl<'a> AttributeExtractor<'a> {
    /// Create an extractor over a decoded batch.
    ///
    /// Disk devices are discovered once from the `systemMetrics/disks/`
    /// paths present in the batch.
    pub fn new(metrics: &'a MetricArrays) -> Self {
        let mut disks: Vec<DiskPath<'a>> = metrics
            .keys()
            .filter_map(|path| {
                let rest = path.strip_prefix(DISK_PREFIX)?;
                let (device, field) = rest.split_once('/')?;
                Some(DiskPath {
                    path: path.as_str(),
                    device,
                    field: DiskField::parse(field)?,
                })
            })
            .collect();
        disks.sort_by(|a, b| a.path.cmp(b.path));

        Self { metrics, disks }
    }

    /// Number of samples in the batch (the longest array).
    pub fn sample_count(&self) -> usize {
        self.metrics.values().map(Vec::len).max().unwrap_or(0)
    }

    fn get(&self, path: &str, i: usize) -> u64 {
        self.metrics
            .get(path)
            .and_then(|values| values.get(i))
            .copied()
            .unwrap_or(0)
    }

    fn ss(&self, path: &str, i: usize) -> u64 {
        self.get(&format!("serverStatus/{path}"), i)
    }

    fn rw(&self, prefix: &str, i: usize) -> ReadersWriters {
        ReadersWriters {
            readers: self.ss(&format!("{prefix}/readers"), i),
            writers: self.ss(&format!("{prefix}/writers"), i),
        }
    }

    fn latency(&self, op: &str, i: usize) -> LatencyCounter {
        LatencyCounter {
            latency: self.ss(&format!("opLatencies/{op}/latency"), i),
            ops: self.ss(&format!("opLatencies/{op}/ops"), i),
        }
    }

    /// Project sample `i` into a `serverStatus` snapshot.
    pub fn server_status(&self, i: usize) -> ServerStatus {
        ServerStatus {
            local_time_ms: self.ss("localTime", i) as i64,
            uptime: self.ss("uptime", i),
            mem: Memory {
                resident: self.ss("mem/resident", i),
                r#virtual: self.ss("mem/virtual", i),
            },
            connections: Connections {
                current: self.ss("connections/current", i),
                available: self.ss("connections/available", i),
                total_created: self.ss("connections/totalCreated", i),
                active: self.ss("connections/active", i),
            },
            network: Network {
                bytes_in: self.ss("network/bytesIn", i),
                bytes_out: self.ss("network/bytesOut", i),
                num_requests: self.ss("network/numRequests", i),
                physical_bytes_in: self.ss("network/physicalBytesIn", i),
                physical_bytes_out: self.ss("network/physicalBytesOut", i),
            },
            extra_info: ExtraInfo {
                page_faults: self.ss("extra_info/page_faults", i),
            },
            global_lock: GlobalLock {
                active_clients: self.rw("globalLock/activeClients", i),
                current_queue: self.rw("globalLock/currentQueue", i),
            },
            op_counters: OpCounters {
                command: self.ss("opcounters/command", i),
                delete: self.ss("opcounters/delete", i),
                getmore: self.ss("opcounters/getmore", i),
                insert: self.ss("opcounters/insert", i),
                query: self.ss("opcounters/query", i),
                update: self.ss("opcounters/update", i),
            },
            op_latencies: OpLatencies {
                commands: self.latency("commands", i),
                reads: self.latency("reads", i),
                writes: self.latency("writes", i),
            },
            query_executor: QueryExecutor {
                scanned: self.ss("metrics/queryExecutor/scanned", i),
                scanned_objects: self.ss("metrics/queryExecutor/scannedObjects", i),
            },
            scan_and_order: self.ss("metrics/operation/scanAndOrder", i),
            wired_tiger: self.wired_tiger(i),
        }
    }

    fn wired_tiger(&self, i: usize) -> WiredTiger {
        let wt = |path: &str| self.ss(&format!("wiredTiger/{path}"), i);
        WiredTiger {
            block_manager: BlockManager {
                bytes_read: wt("block-manager/bytes read"),
                bytes_written: wt("block-manager/bytes written"),
                bytes_written_for_checkpoint: wt("block-manager/bytes written for checkpoint"),
            },
            cache: WiredTigerCache {
                bytes_in_cache: wt("cache/bytes currently in the cache"),
                max_bytes_configured: wt("cache/maximum bytes configured"),
                tracked_dirty_bytes: wt("cache/tracked dirty bytes in the cache"),
                modified_pages_evicted: wt("cache/modified pages evicted"),
                unmodified_pages_evicted: wt("cache/unmodified pages evicted"),
                bytes_read_into_cache: wt("cache/bytes read into cache"),
                bytes_written_from_cache: wt("cache/bytes written from cache"),
            },
            active_data_handles: wt("data-handle/connection data handles currently active"),
            read_tickets_available: wt("concurrentTransactions/read/available"),
            write_tickets_available: wt("concurrentTransactions/write/available"),
        }
    }

    /// Project sample `i` into a `systemMetrics` snapshot.
    ///
    /// The sample time and uptime come from the `serverStatus` section of
    /// the same sample.
    pub fn system_metrics(&self, i: usize) -> SystemMetrics {
        let cpu = |name: &str| self.get(&format!("systemMetrics/cpu/{name}"), i);

        let mut disks: BTreeMap<String, DiskCounters> = BTreeMap::new();
        for disk in &self.disks {
            let counters = disks.entry(disk.device.to_string()).or_default();
            disk.field.set(counters, self.get(disk.path, i));
        }

        SystemMetrics {
            timestamp_ms: self.ss("localTime", i) as i64,
            uptime: self.ss("uptime", i),
            cpu: CpuCounters {
                idle_ms: cpu("idle_ms"),
                iowait_ms: cpu("iowait_ms"),
                nice_ms: cpu("nice_ms"),
                softirq_ms: cpu("softirq_ms"),
                steal_ms: cpu("steal_ms"),
                system_ms: cpu("system_ms"),
                user_ms: cpu("user_ms"),
            },
            disks,
        }
    }
}
