//! Store lookups behind the `/search` and `/query` routes.

use ftdcwatch_analytics::catalog::{disk_target, short_label, REPLICATION_LAGS};
use ftdcwatch_analytics::range::filter;
use ftdcwatch_analytics::{Assessment, Cell, Column, StoreData, Table};
use ftdcwatch_types::{ServerInfo, TimeSeries, MB};

use super::protocol::{QueryRequest, QueryResponse, TargetKind};

pub const HOST_INFO: &str = "host_info";
pub const ASSESSMENT: &str = "assessment";

/// Every queryable target name.
pub fn search(data: &StoreData) -> Vec<String> {
    let mut names = data.names();
    names.push(HOST_INFO.to_string());
    names
}

/// Answer every target of a query, in request order.
pub fn query(data: &StoreData, req: &QueryRequest, verbose: bool, blocks: usize) -> Vec<QueryResponse> {
    let (from, to) = req.range.millis();
    let mut out = Vec::new();

    for target in &req.targets {
        match target.kind {
            TargetKind::Timeserie => {
                let series = time_series(data, &target.target, from, to);
                out.extend(series.into_iter().map(QueryResponse::Series));
            }
            TargetKind::Table => match target.target.as_str() {
                HOST_INFO => out.push(QueryResponse::Table(host_info_table(
                    &data.server_info,
                    verbose,
                ))),
                ASSESSMENT => out.push(QueryResponse::Table(
                    Assessment::new(data)
                        .blocks(blocks)
                        .verbose(verbose)
                        .table(from, to),
                )),
                _ => {}
            },
            TargetKind::Other => {}
        }
    }
    out
}

/// Series for one time series target. Fan-out targets expand to one series
/// per device or replica member, named after it; everything else is a plain
/// lookup labelled with its short name.
fn time_series(data: &StoreData, target: &str, from: f64, to: f64) -> Vec<TimeSeries> {
    if target == REPLICATION_LAGS && !data.replication_lags.is_empty() {
        return data
            .replication_lags
            .iter()
            .map(|(member, series)| filter(&series.renamed(member.as_str()), from, to))
            .collect();
    }

    if let Some(kind) = disk_target(target) {
        if !data.disks.is_empty() {
            return data
                .disks
                .iter()
                .map(|(device, stats)| filter(&stats.series(kind).renamed(device.as_str()), from, to))
                .collect();
        }
    }

    let label = short_label(target);
    let series = match data.get(target) {
        Some(series) => filter(&series.renamed(label), from, to),
        None => TimeSeries::new(label),
    };
    vec![series]
}

/// Host facts as a single-column table.
pub fn host_info_table(info: &ServerInfo, verbose: bool) -> Table {
    let system = &info.host_info.system;
    let os = &info.host_info.os;

    let mut rows = vec![format!("CPU: {} cores ({})", system.num_cores, system.cpu_arch)];
    if verbose {
        rows.push(format!("Host: {}", system.hostname));
    }
    rows.push(format!(
        "Memory: {}",
        storage_size(system.mem_size_mb as f64 * MB)
    ));
    rows.push(format!("{} ({})", os.os_type, os.version));
    rows.push(os.name.clone());
    rows.push(format!("MongoDB v{}", info.build_info.version));

    let mut table = Table::new(vec![Column::new("Configurations", "String")]);
    table.rows = rows.into_iter().map(|r| vec![Cell::Text(r)]).collect();
    table
}

/// Human readable byte size, truncated to one decimal.
pub fn storage_size(bytes: f64) -> String {
    const UNITS: [(&str, f64); 4] = [
        ("TB", 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("GB", 1024.0 * 1024.0 * 1024.0),
        ("MB", 1024.0 * 1024.0),
        ("KB", 1024.0),
    ];
    let (unit, scaled) = UNITS
        .iter()
        .find(|(_, size)| bytes >= *size)
        .map(|(unit, size)| (*unit, bytes / size))
        .unwrap_or(("B", bytes));

    let truncated = (scaled * 10.0).trunc() / 10.0;
    if truncated.fract() == 0.0 {
        format!("{} {}", truncated as i64, unit)
    } else {
        format!("{:.1} {}", truncated, unit)
    }
}
