//! Reader for `keyhole_stats.*` files.
//!
//! The format is line-delimited JSON repeating every three lines:
//!
//! 1. an array of `serverStatus` documents
//! 2. an array of `replSetGetStatus` documents
//! 3. the server info document (only the first occurrence is used)
//!
//! Each status line becomes one [`MetricsBatch`] by flattening the documents
//! into the same slash-separated paths an FTDC file decodes to, so both
//! formats share one extraction path.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::DateTime;
use ftdcwatch_types::{MemberState, ReplMember, ReplSetStatus, ServerInfo};
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::decoder::{DecodedFile, MetricsBatch};
use crate::error::IngestError;
use crate::extract::MetricArrays;

/// Read and decode a keyhole_stats file.
pub fn read_keyhole_stats(path: &Path) -> Result<DecodedFile, IngestError> {
    let file = File::open(path).map_err(|e| IngestError::io(path, e))?;
    parse_keyhole_stats(path, BufReader::new(file))
}

/// Decode keyhole_stats content from any buffered reader. `path` is only
/// used in error messages.
pub fn parse_keyhole_stats<R: BufRead>(path: &Path, reader: R) -> Result<DecodedFile, IngestError> {
    let mut decoded = DecodedFile::default();
    let mut status_docs = 0;
    let mut repl_docs = 0;
    let mut first_version: Option<String> = None;

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| IngestError::io(path, e))?;
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let parse_err = |source| IngestError::Json {
            path: path.to_path_buf(),
            line: line_no,
            source,
        };

        match line_no % 3 {
            1 => {
                let docs: Vec<Value> = serde_json::from_str(&line).map_err(parse_err)?;
                if first_version.is_none() {
                    first_version = docs
                        .first()
                        .and_then(|d| d.get("version"))
                        .and_then(Value::as_str)
                        .map(str::to_string);
                }
                status_docs += docs.len();
                decoded.batches.push(flatten_batch(&docs));
            }
            2 => {
                let docs: Vec<Value> = serde_json::from_str(&line).map_err(parse_err)?;
                repl_docs += docs.len();
                let statuses = docs.iter().filter_map(parse_repl_status);
                match decoded.batches.last_mut() {
                    Some(batch) => batch.repl_status.extend(statuses),
                    None => decoded.batches.push(MetricsBatch {
                        repl_status: statuses.collect(),
                        ..Default::default()
                    }),
                }
            }
            _ if line_no == 3 => {
                let info: ServerInfo = serde_json::from_str(&line).map_err(parse_err)?;
                decoded.server_info = Some(info);
            }
            _ => {}
        }
    }

    if status_docs == 0 && repl_docs == 0 {
        return Err(IngestError::NoDocuments(path.to_path_buf()));
    }

    if decoded.server_info.is_none() {
        if let Some(version) = first_version {
            let mut info = ServerInfo::default();
            info.build_info.version = version;
            decoded.server_info = Some(info);
        }
    }

    debug!(
        path = %path.display(),
        status_docs,
        repl_docs,
        "Parsed keyhole_stats file"
    );
    Ok(decoded)
}

/// Flatten a line of `serverStatus` documents into per-sample arrays.
fn flatten_batch(docs: &[Value]) -> MetricsBatch {
    let samples = docs.len();
    let mut metrics: MetricArrays = HashMap::new();
    let mut flat = Vec::new();

    for (i, doc) in docs.iter().enumerate() {
        flat.clear();
        flatten("serverStatus", doc, &mut flat);
        for (path, value) in flat.drain(..) {
            metrics.entry(path).or_insert_with(|| vec![0; samples])[i] = value;
        }
    }

    MetricsBatch {
        num_deltas: samples.saturating_sub(1),
        metrics,
        repl_status: Vec::new(),
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, u64)>) {
    if let Some(v) = scalar(value) {
        out.push((prefix.to_string(), v));
        return;
    }
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                flatten(&format!("{prefix}/{key}"), v, out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten(&format!("{prefix}/{i}"), v, out);
            }
        }
        _ => {}
    }
}

/// Numeric value of a leaf, including dates and extended JSON wrappers.
/// Negative and fractional numbers truncate toward zero.
fn scalar(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => Some(to_u64(n)),
        Value::Bool(b) => Some(u64::from(*b)),
        Value::String(s) => rfc3339_millis(s).map(|ms| ms.max(0) as u64),
        Value::Object(map) => extended_scalar(map),
        _ => None,
    }
}

fn to_u64(n: &Number) -> u64 {
    n.as_u64()
        .unwrap_or_else(|| n.as_f64().map_or(0, |f| f as u64))
}

fn extended_scalar(map: &Map<String, Value>) -> Option<u64> {
    if let Some(date) = map.get("$date") {
        return date_millis(date).map(|ms| ms.max(0) as u64);
    }
    if let Some(ts) = map.get("$timestamp") {
        return ts.get("t").and_then(Value::as_u64);
    }
    ["$numberLong", "$numberInt", "$numberDouble"]
        .iter()
        .find_map(|key| map.get(*key))
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<f64>().ok())
        .map(|f| f as u64)
}

fn rfc3339_millis(s: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// Milliseconds since the epoch from a date in any of the shapes the
/// server emits: RFC 3339 string, number, `{"$date": ...}` or
/// `{"$numberLong": "..."}`.
fn date_millis(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => rfc3339_millis(s),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::Object(map) => match (map.get("$date"), map.get("$numberLong")) {
            (Some(date), _) => date_millis(date),
            (None, Some(Value::String(s))) => s.parse().ok(),
            _ => None,
        },
        _ => None,
    }
}

fn parse_repl_status(doc: &Value) -> Option<ReplSetStatus> {
    let date_ms = doc.get("date").and_then(date_millis)?;
    let members = doc
        .get("members")?
        .as_array()?
        .iter()
        .filter_map(parse_member)
        .collect();
    Some(ReplSetStatus::new(date_ms, members))
}

fn parse_member(doc: &Value) -> Option<ReplMember> {
    let name = doc.get("name")?.as_str()?;
    let state = doc.get("state").and_then(Value::as_i64).unwrap_or(0);
    let optime = doc.get("optime").map(optime_secs).unwrap_or(0);
    Some(ReplMember::new(
        name,
        MemberState::from(state as i32),
        optime,
    ))
}

/// Seconds component of a member optime.
///
/// Accepts a bare number, a `$timestamp`, an `{ts, t}` optime document
/// (where `ts` holds the timestamp and `t` the term), or the key/value list
/// form some exporters produce.
fn optime_secs(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::Object(map) => {
            if let Some(ts) = map.get("$timestamp") {
                return ts.get("t").and_then(Value::as_i64).unwrap_or(0);
            }
            if let Some(ts) = map.get("ts") {
                return optime_secs(ts);
            }
            if map.get("Key").and_then(Value::as_str) == Some("ts") {
                return map.get("Value").map(optime_secs).unwrap_or(0);
            }
            map.get("T")
                .or_else(|| map.get("t"))
                .and_then(Value::as_i64)
                .unwrap_or(0)
        }
        Value::Array(items) => items
            .iter()
            .find(|item| item.get("Key").and_then(Value::as_str) == Some("ts"))
            .map(optime_secs)
            .unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{Cursor, Write};

    fn status_line(docs: &[Value]) -> String {
        serde_json::to_string(docs).unwrap()
    }

    #[test]
    fn test_flatten_handles_extended_json() {
        let doc = json!({
            "localTime": {"$date": "2024-01-02T03:04:05.678Z"},
            "uptime": 12.9,
            "mem": {"resident": 512, "virtual": {"$numberLong": "2048"}},
            "version": "4.4.6",
            "repl": {"ismaster": true},
            "opLatencies": {"reads": {"latency": -5}},
            "wiredTiger": {"cache": {"maximum bytes configured": 1.5e9}}
        });
        let batch = flatten_batch(&[doc]);
        let get = |path: &str| batch.metrics.get(path).map(|v| v[0]);

        assert_eq!(get("serverStatus/localTime"), Some(1_704_164_645_678));
        assert_eq!(get("serverStatus/uptime"), Some(12));
        assert_eq!(get("serverStatus/mem/virtual"), Some(2048));
        assert_eq!(get("serverStatus/repl/ismaster"), Some(1));
        assert_eq!(get("serverStatus/opLatencies/reads/latency"), Some(0));
        assert_eq!(
            get("serverStatus/wiredTiger/cache/maximum bytes configured"),
            Some(1_500_000_000)
        );
        assert_eq!(get("serverStatus/version"), None);
    }

    #[test]
    fn test_missing_paths_zero_filled_per_sample() {
        let batch = flatten_batch(&[json!({"uptime": 1}), json!({"uptime": 2, "extra": 9})]);
        assert_eq!(batch.num_deltas, 1);
        assert_eq!(batch.metrics["serverStatus/extra"], vec![0, 9]);
    }

    #[test]
    fn test_optime_shapes() {
        assert_eq!(optime_secs(&json!(1000)), 1000);
        assert_eq!(optime_secs(&json!({"$timestamp": {"t": 77, "i": 1}})), 77);
        assert_eq!(
            optime_secs(&json!({"ts": {"$timestamp": {"t": 88, "i": 1}}, "t": 3})),
            88
        );
        assert_eq!(optime_secs(&json!({"ts": {"T": 99, "I": 2}, "t": 3})), 99);
        assert_eq!(
            optime_secs(&json!([{"Key": "t", "Value": 3}, {"Key": "ts", "Value": {"T": 55}}])),
            55
        );
        assert_eq!(optime_secs(&json!("bogus")), 0);
    }

    #[test]
    fn test_parse_three_line_groups() {
        let ss = |t: &str, uptime: u64| json!({"localTime": t, "uptime": uptime, "version": "5.0.1"});
        let repl = json!({
            "date": {"$date": "2024-01-01T00:00:10Z"},
            "members": [
                {"name": "a.example.net:27017", "state": 1, "optime": {"ts": {"$timestamp": {"t": 100, "i": 1}}}},
                {"name": "b.example.net:27017", "state": 2, "optime": {"ts": {"$timestamp": {"t": 97, "i": 1}}}}
            ]
        });
        let info = json!({
            "hostInfo": {"system": {"numCores": 4, "memSizeMB": 8192}},
            "buildInfo": {"version": "5.0.1"}
        });
        let content = [
            status_line(&[ss("2024-01-01T00:00:00Z", 1), ss("2024-01-01T00:00:01Z", 2)]),
            status_line(&[repl]),
            info.to_string(),
            status_line(&[ss("2024-01-01T00:00:02Z", 3)]),
            status_line(&[]),
        ]
        .join("\n");

        let decoded =
            parse_keyhole_stats(Path::new("keyhole_stats.test"), Cursor::new(content)).unwrap();
        assert_eq!(decoded.batches.len(), 2);
        assert_eq!(decoded.batches[0].repl_status.len(), 1);
        assert_eq!(decoded.batches[0].repl_status[0].primary_optime(), Some(100));

        let info = decoded.server_info.as_ref().unwrap();
        assert_eq!(info.host_info.system.num_cores, 4);

        let set = decoded_snapshots(&decoded);
        assert_eq!(set, vec![3, 1]);
    }

    fn decoded_snapshots(decoded: &DecodedFile) -> Vec<usize> {
        let set = decoded.snapshots();
        vec![set.server_status.len(), set.repl_status.len()]
    }

    #[test]
    fn test_version_fallback_without_server_info_line() {
        let content = status_line(&[json!({"uptime": 1, "version": "4.2.0"})]);
        let decoded =
            parse_keyhole_stats(Path::new("keyhole_stats.x"), Cursor::new(content)).unwrap();
        assert_eq!(decoded.server_info.unwrap().build_info.version, "4.2.0");
    }

    #[test]
    fn test_empty_file_has_no_documents() {
        let err = parse_keyhole_stats(Path::new("keyhole_stats.empty"), Cursor::new("[]\n[]\n"))
            .err();
        assert!(matches!(err, Some(IngestError::NoDocuments(_))));
    }

    #[test]
    fn test_bad_json_reports_line() {
        let err = parse_keyhole_stats(Path::new("k"), Cursor::new("[]\n{oops\n")).err();
        assert!(matches!(err, Some(IngestError::Json { line: 2, .. })));
    }

    #[test]
    fn test_read_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", status_line(&[json!({"uptime": 5})])).unwrap();

        let decoded = read_keyhole_stats(file.path()).unwrap();
        assert_eq!(decoded.batches[0].metrics["serverStatus/uptime"], vec![5]);
    }
}
