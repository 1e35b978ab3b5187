//! Report rendering.
//!
//! Every format renders the same [`ReportDocument`]; the profile decides which
//! metric groups appear. Rendering is pure: it returns bytes and never touches disk.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{MetricKey, Profile, ReportFormat};
use crate::error_handling::ReportError;
use crate::metrics::MetricsSnapshot;
use crate::models::{ProbeResult, ScanStatus};

/// Everything a report describes.
#[derive(Debug, Clone)]
pub struct ReportDocument {
    /// Base target of the scan
    pub target: String,
    pub profile: Profile,
    pub status: ScanStatus,
    pub results: Vec<ProbeResult>,
    pub metrics: MetricsSnapshot,
    pub generated_at: DateTime<Utc>,
}

/// One row of the results table.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
    pub target: String,
    pub status: Option<u16>,
    pub elapsed_ms: u64,
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ProbeResult> for ResultRow {
    fn from(result: &ProbeResult) -> Self {
        ResultRow {
            target: result.target.clone(),
            status: result.status(),
            elapsed_ms: result.elapsed_ms,
            content_type: result.content_type.clone(),
            error: result
                .error_kind()
                .map(|kind| format!("{}: {}", kind, result.error_message().unwrap_or(""))),
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    target: &'a str,
    profile: Profile,
    scan_status: ScanStatus,
    generated_at: DateTime<Utc>,
    results: Vec<ResultRow>,
    metrics: Map<String, Value>,
}

/// Metric groups of the snapshot that the profile includes, keyed by metric name.
pub fn profile_metrics(
    snapshot: &MetricsSnapshot,
    profile: Profile,
) -> Result<Map<String, Value>, ReportError> {
    let mut metrics = Map::new();
    for key in profile.metrics() {
        let value = match key {
            MetricKey::TotalRequests => Value::from(snapshot.total_requests),
            MetricKey::FoundCount => Value::from(snapshot.found_count),
            MetricKey::Errors => Value::from(snapshot.errors),
            MetricKey::ResponseTimes => serde_json::to_value(&snapshot.response_times)?,
            MetricKey::StatusCodes => serde_json::to_value(&snapshot.status_codes)?,
            MetricKey::ContentTypes => serde_json::to_value(&snapshot.content_types)?,
            MetricKey::ErrorKinds => serde_json::to_value(&snapshot.errors_by_kind)?,
            MetricKey::CacheHits => Value::from(snapshot.cache_hits),
            MetricKey::Resources => serde_json::json!({
                "samples": serde_json::to_value(&snapshot.resources)?,
                "averages": serde_json::to_value(&snapshot.resource_averages)?,
            }),
            MetricKey::Duration => serde_json::json!({
                "started_at": snapshot.started_at,
                "finished_at": snapshot.finished_at,
                "duration_ms": snapshot.duration_ms,
            }),
        };
        metrics.insert(key.as_str().to_string(), value);
    }
    Ok(metrics)
}

/// Plain-text summary saved when the `format` artifact cannot be produced.
pub fn render_fallback(document: &ReportDocument, format: ReportFormat) -> String {
    let metrics = profile_metrics(&document.metrics, document.profile)
        .and_then(|metrics| Ok(serde_json::to_string_pretty(&metrics)?))
        .unwrap_or_else(|e| format!("unavailable: {e}"));
    format!(
        "FALLBACK REPORT (original format: {})\n{}\nTarget: {}\nStatus: {}\nMetrics:\n{}\n\nResults Count: {}\n",
        format,
        "=".repeat(50),
        document.target,
        document.status,
        metrics,
        document.results.len()
    )
}

pub fn render(document: &ReportDocument, format: ReportFormat) -> Result<Vec<u8>, ReportError> {
    match format {
        ReportFormat::Json => render_json(document),
        ReportFormat::Html => render_html(document),
        ReportFormat::Csv => render_csv(document),
    }
}

pub fn render_json(document: &ReportDocument) -> Result<Vec<u8>, ReportError> {
    let report = JsonReport {
        target: &document.target,
        profile: document.profile,
        scan_status: document.status,
        generated_at: document.generated_at,
        results: document.results.iter().map(ResultRow::from).collect(),
        metrics: profile_metrics(&document.metrics, document.profile)?,
    };
    Ok(serde_json::to_vec_pretty(&report)?)
}

pub fn render_csv(document: &ReportDocument) -> Result<Vec<u8>, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["target", "status", "elapsed_ms", "content_type"])?;
    for result in &document.results {
        writer.write_record([
            result.target.clone(),
            result.status().map(|s| s.to_string()).unwrap_or_default(),
            result.elapsed_ms.to_string(),
            result.content_type.clone().unwrap_or_default(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| ReportError::Io(e.into_error()))
}

/// Escapes text for HTML element content and attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn html_count_table(title: &str, counts: &std::collections::BTreeMap<String, u64>) -> String {
    let mut table = format!(
        "<h2>{}</h2>\n<table>\n<tr><th>Key</th><th>Count</th></tr>\n",
        escape_html(title)
    );
    for (key, count) in counts {
        table.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>\n",
            escape_html(key),
            count
        ));
    }
    table.push_str("</table>\n");
    table
}

const HTML_STYLE: &str = "body{font-family:sans-serif;margin:2em;color:#222}\
table{border-collapse:collapse;margin-bottom:1.5em}\
td,th{border:1px solid #ccc;padding:4px 10px;text-align:left}\
th{background:#f0f0f0}tr.found td{background:#eaf7ea}tr.error td{color:#a00}";

pub fn render_html(document: &ReportDocument) -> Result<Vec<u8>, ReportError> {
    let metrics = &document.metrics;
    let profile = document.profile;
    let title = format!("Scan report: {}", document.target);

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(&title)));
    html.push_str(&format!("<style>{HTML_STYLE}</style>\n</head>\n<body>\n"));
    html.push_str(&format!("<h1>{}</h1>\n", escape_html(&title)));
    html.push_str(&format!(
        "<p>Profile: {} &middot; Status: {} &middot; Generated: {}</p>\n",
        profile,
        document.status,
        document.generated_at.to_rfc3339()
    ));

    html.push_str("<h2>Summary</h2>\n<table>\n");
    let mut summary = vec![
        ("Total requests", metrics.total_requests.to_string()),
        ("Found", metrics.found_count.to_string()),
        ("Errors", metrics.errors.to_string()),
    ];
    if profile.includes(MetricKey::ResponseTimes) {
        let times = &metrics.response_times;
        summary.push(("Mean response (ms)", format!("{:.1}", times.mean_ms)));
        summary.push(("Median response (ms)", format!("{:.1}", times.median_ms)));
        summary.push(("Fastest (ms)", times.min_ms.to_string()));
        summary.push(("Slowest (ms)", times.max_ms.to_string()));
    }
    if profile.includes(MetricKey::CacheHits) {
        summary.push(("Cache hits", metrics.cache_hits.to_string()));
    }
    if profile.includes(MetricKey::Duration) {
        summary.push(("Duration (ms)", metrics.duration_ms.to_string()));
    }
    for (label, value) in summary {
        html.push_str(&format!("<tr><th>{label}</th><td>{value}</td></tr>\n"));
    }
    html.push_str("</table>\n");

    if profile.includes(MetricKey::StatusCodes) {
        html.push_str(&html_count_table("Status codes", &metrics.status_codes));
    }
    if profile.includes(MetricKey::ContentTypes) {
        html.push_str(&html_count_table("Content types", &metrics.content_types));
    }
    if profile.includes(MetricKey::ErrorKinds) {
        html.push_str(&html_count_table("Errors by kind", &metrics.errors_by_kind));
    }
    if profile.includes(MetricKey::Resources) {
        if let Some(peak) = metrics.resources.iter().map(|s| s.memory_bytes).max() {
            html.push_str(&format!(
                "<p>Peak memory: {:.1} MiB over {} samples</p>\n",
                peak as f64 / 1_048_576.0,
                metrics.resources.len()
            ));
        }
        let averages = &metrics.resource_averages;
        if averages.samples > 0 {
            html.push_str(&format!(
                "<p>Average CPU: {:.1}% &middot; Average disk read: {:.1} MiB &middot; Average disk write: {:.1} MiB</p>\n",
                averages.cpu_percent,
                averages.disk_read_bytes / 1_048_576.0,
                averages.disk_write_bytes / 1_048_576.0
            ));
        }
    }

    html.push_str("<h2>Results</h2>\n<table>\n");
    html.push_str("<tr><th>Target</th><th>Status</th><th>Elapsed (ms)</th><th>Content type</th><th>Error</th></tr>\n");
    for result in &document.results {
        let row = ResultRow::from(result);
        let class = if result.found {
            " class=\"found\""
        } else if row.error.is_some() {
            " class=\"error\""
        } else {
            ""
        };
        html.push_str(&format!(
            "<tr{}><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            class,
            escape_html(&row.target),
            row.status.map(|s| s.to_string()).unwrap_or_default(),
            row.elapsed_ms,
            escape_html(row.content_type.as_deref().unwrap_or("")),
            escape_html(row.error.as_deref().unwrap_or("")),
        ));
    }
    html.push_str("</table>\n</body>\n</html>\n");

    Ok(html.into_bytes())
}
