//! Health assessment over a time window.
//!
//! An assessment scores every catalog metric and every discovered disk for a
//! window, drops what could not be scored (unless verbose), ranks the rest
//! worst first and packs them into a fixed-width table.

use serde::Serialize;

use crate::catalog::{SERVER_STATUS_METRICS, SYSTEM_METRICS, WIRED_TIGER_METRICS};
use crate::error::RangeError;
use crate::range::Percentiles;
use crate::score::{DeviceMetric, HostFacts, ScanWindow, ScoringConfig, NOT_EVALUABLE};
use crate::store::StoreData;

/// Longest window an assessment covers.
pub const MAX_WINDOW_MS: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

/// Default number of metric blocks per table row.
pub const DEFAULT_BLOCKS: usize = 3;

const BLOCK_HEADERS: [&str; 5] = ["Metric", "Score", "p5", "Median", "p95"];

/// Table column header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Column {
    pub fn new(text: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: kind.into(),
        }
    }
}

/// One table cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Score(i32),
    Number(f64),
}

/// Dashboard table response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<Column>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table with the given columns.
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            kind: "table",
            rows: Vec::new(),
        }
    }
}

/// One scored metric.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentRow {
    pub label: String,
    pub score: i32,
    pub p5: f64,
    pub median: f64,
    pub p95: f64,
}

impl AssessmentRow {
    fn cells(&self) -> [Cell; 5] {
        [
            Cell::Text(self.label.clone()),
            Cell::Score(self.score),
            Cell::Number(self.p5),
            Cell::Number(self.median),
            Cell::Number(self.p95),
        ]
    }
}

/// Assessment of the data in a store.
#[derive(Debug)]
pub struct Assessment<'a> {
    data: &'a StoreData,
    config: ScoringConfig,
    blocks: usize,
    verbose: bool,
}

impl<'a> Assessment<'a> {
    /// Build an assessment whose scoring config is bound to the store's
    /// host facts.
    pub fn new(data: &'a StoreData) -> Self {
        Self {
            data,
            config: ScoringConfig::new(HostFacts::from_store(data)),
            blocks: DEFAULT_BLOCKS,
            verbose: false,
        }
    }

    /// Number of metric blocks per table row.
    pub fn blocks(mut self, blocks: usize) -> Self {
        self.blocks = blocks.max(1);
        self
    }

    /// Keep rows that could not be scored.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The scoring configuration in use.
    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score every metric over `[from_ms, to_ms]`, worst first.
    pub fn rows(&self, from_ms: f64, to_ms: f64) -> Result<Vec<AssessmentRow>, RangeError> {
        if to_ms - from_ms > MAX_WINDOW_MS {
            return Err(RangeError::WindowTooWide);
        }

        let scan = ScanWindow::from_store(self.data, from_ms, to_ms);
        let metrics = SERVER_STATUS_METRICS
            .iter()
            .chain(WIRED_TIGER_METRICS)
            .chain(SYSTEM_METRICS.iter().filter(|m| m.starts_with("cpu_")));

        let mut rows = Vec::new();
        for metric in metrics {
            let p = self
                .data
                .get(metric)
                .map(|s| Percentiles::of_window(s, from_ms, to_ms))
                .unwrap_or(Percentiles::MISSING);
            let score = self.config.score(metric, &p, scan.as_ref());
            self.keep(&mut rows, self.row(metric, score, &p));
        }

        for (device, stats) in &self.data.disks {
            let iops = Percentiles::of_window(&stats.iops, from_ms, to_ms);
            if iops.is_missing() || iops.p95 == 0.0 {
                continue;
            }
            let score = self.config.score_device(DeviceMetric::Iops, &iops);
            self.keep(&mut rows, self.row(&DeviceMetric::Iops.label(device), score, &iops));

            let util = Percentiles::of_window(&stats.utilization, from_ms, to_ms);
            let score = self.config.score_device(DeviceMetric::Utilization, &util);
            let label = DeviceMetric::Utilization.label(device);
            self.keep(&mut rows, self.row(&label, score, &util));
        }

        rows.sort_by(|a, b| a.score.cmp(&b.score).then_with(|| a.label.cmp(&b.label)));
        Ok(rows)
    }

    /// Render the assessment as a dashboard table.
    ///
    /// A window longer than a day yields a single explanatory row.
    pub fn table(&self, from_ms: f64, to_ms: f64) -> Table {
        match self.rows(from_ms, to_ms) {
            Ok(rows) => {
                let columns = (0..self.blocks)
                    .flat_map(|_| BLOCK_HEADERS)
                    .map(|h| Column::new(h, "Number"))
                    .collect();
                let mut table = Table::new(columns);
                table.rows = rows
                    .chunks(self.blocks)
                    .map(|chunk| chunk.iter().flat_map(AssessmentRow::cells).collect())
                    .collect();
                table
            }
            Err(err) => {
                let mut table = Table::new(vec![Column::new("Reason", "string")]);
                table.rows.push(vec![Cell::Text(err.to_string())]);
                table
            }
        }
    }

    fn keep(&self, rows: &mut Vec<AssessmentRow>, row: AssessmentRow) {
        if row.score < NOT_EVALUABLE || self.verbose {
            rows.push(row);
        }
    }

    fn row(&self, metric: &str, score: i32, p: &Percentiles) -> AssessmentRow {
        let mut label = metric.replace("modified_evicted", "mod_evicted");

        let share_rule = self
            .config
            .formula(metric)
            .map(|f| f.rule)
            .filter(|rule| rule.is_share());
        let shown = |v: f64| match share_rule {
            Some(rule) => self.config.as_share(rule, v).unwrap_or(v),
            None => v,
        };

        let is_percent = metric.starts_with("cpu_")
            || metric.starts_with(DeviceMetric::Utilization.prefix())
            || share_rule.is_some_and(|rule| self.config.as_share(rule, 0.0).is_some());
        if is_percent {
            label.push_str(" %");
        }

        AssessmentRow {
            label,
            score,
            p5: shown(p.p5).round(),
            median: shown(p.median).round(),
            p95: shown(p.p95).round(),
        }
    }
}
