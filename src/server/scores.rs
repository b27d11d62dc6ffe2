//! HTML page documenting every scoring formula and its watermarks.

use ftdcwatch_analytics::ScoringConfig;

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <title>Metric Scores</title>
  <meta http-equiv="Cache-Control" content="no-cache, no-store, must-revalidate" />
  <style>
    body { font-family: Arial, Helvetica, sans-serif; font-size: 11px; }
    table { font-family: Consolas, monaco, monospace; border-collapse: collapse; min-width: 600px; }
    table, th, td { border: 1px solid gray; }
    th, td { height: 24px; padding: 4px; vertical-align: middle; }
    th { background-color: #333; color: #fff; }
    .rowtitle { font-weight: bold; }
    .selected { background-color: #ffe680; }
  </style>
</head>
<body><h3>Scores:</h3>
<table>
<tr><th>Metric</th><th>Formula</th><th>Low Watermark</th><th>High Watermark</th></tr>
"#;

/// Render the formula table, highlighting the row for `metric`.
pub fn scores_page(config: &ScoringConfig, metric: &str) -> String {
    let mut html = String::from(HEAD);
    for formula in config.formulas() {
        let selected = formula.metric == metric
            || formula
                .metric
                .strip_suffix("<dev>")
                .is_some_and(|family| metric.starts_with(family));
        let class = if selected {
            "rowtitle selected"
        } else {
            "rowtitle"
        };
        html.push_str(&format!(
            "<tr><td class='{}'>{}</td><td>{}</td><td align='right'>{}</td><td align='right'>{}</td></tr>\n",
            class,
            escape(&formula.metric),
            escape(formula.formula),
            with_thousands(formula.low),
            with_thousands(formula.high),
        ));
    }
    html.push_str("</table></body></html>");
    html
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Format a number with comma thousands separators.
fn with_thousands(v: f64) -> String {
    let plain = v.abs().to_string();
    let (int, frac) = plain.split_once('.').unwrap_or((plain.as_str(), ""));

    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if v < 0.0 { "-" } else { "" };
    if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }
}
