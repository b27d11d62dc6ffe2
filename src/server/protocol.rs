//! Request and response bodies of the dashboard datasource protocol.

use chrono::{DateTime, Utc};
use ftdcwatch_analytics::Table;
use ftdcwatch_types::TimeSeries;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Errors reported back to the dashboard as `{"ok": 0, "err": ...}`.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid request body: {0}")]
    Body(#[from] serde_json::Error),

    #[error("Failed to read request body: {0}")]
    Read(String),

    #[error("bad method; supported OPTIONS, POST")]
    Method,

    #[error("{0}")]
    Ingest(String),
}

impl ProtocolError {
    pub fn to_json(&self) -> Value {
        json!({"ok": 0, "err": self.to_string()})
    }
}

/// Body of `POST /query`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub timezone: String,
    pub range: QueryRange,
    #[serde(default)]
    pub targets: Vec<QueryTarget>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QueryRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl QueryRange {
    /// Bounds in epoch milliseconds.
    pub fn millis(&self) -> (f64, f64) {
        (
            self.from.timestamp_millis() as f64,
            self.to.timestamp_millis() as f64,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryTarget {
    pub target: String,
    #[serde(rename = "refId", default)]
    pub ref_id: String,
    #[serde(rename = "type", default)]
    pub kind: TargetKind,
}

/// Response shape requested for a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    #[default]
    Timeserie,
    Table,
    #[serde(other)]
    Other,
}

/// Body of `POST /dir`.
#[derive(Debug, Clone, Deserialize)]
pub struct DirRequest {
    pub dir: String,
    /// Only load the last N files; zero loads everything.
    #[serde(default)]
    pub span: usize,
}

/// One element of a `/query` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResponse {
    Series(TimeSeries),
    Table(Table),
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftdcwatch_types::DataPoint;

    #[test]
    fn test_parse_query_request() {
        let body = r#"{
            "timezone": "browser",
            "range": {"from": "2024-01-01T00:00:00.000Z", "to": "2024-01-01T01:00:00.000Z"},
            "targets": [
                {"target": "conns_current", "refId": "A", "type": "timeserie"},
                {"target": "assessment", "refId": "B", "type": "table"},
                {"target": "odd", "type": "heatmap"}
            ]
        }"#;
        let req: QueryRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.range.millis(), (1_704_067_200_000.0, 1_704_070_800_000.0));
        assert_eq!(req.targets[0].kind, TargetKind::Timeserie);
        assert_eq!(req.targets[1].kind, TargetKind::Table);
        assert_eq!(req.targets[2].kind, TargetKind::Other);
    }

    #[test]
    fn test_dir_request_span_defaults_to_zero() {
        let req: DirRequest = serde_json::from_str(r#"{"dir": "/data"}"#).unwrap();
        assert_eq!(req.span, 0);
    }

    #[test]
    fn test_series_response_shape() {
        let series = TimeSeries::with_points("current", vec![DataPoint::new(3.0, 1000.0)]);
        let json = serde_json::to_value(QueryResponse::Series(series)).unwrap();
        assert_eq!(json, json!({"target": "current", "datapoints": [[3.0, 1000.0]]}));
    }

    #[test]
    fn test_error_json() {
        assert_eq!(
            ProtocolError::Method.to_json(),
            json!({"ok": 0, "err": "bad method; supported OPTIONS, POST"})
        );
    }
}
