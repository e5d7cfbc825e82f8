//! GA4 report fetching tool.
//!
//! Runs one Data API `runReport` with a mandatory stream-ID equality filter
//! ANDed with any per-dimension regex filters, persists the full result as
//! an .xlsx artifact, and embeds the tabular data in the reply only when
//! the report is small enough to read inline.

use crate::auth;
use crate::error::ToolError;
use crate::tools::Toolbox;
use chrono::{DateTime, Local};
use serde::Deserialize;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

const ANALYTICS_DATA_BASE: &str = "https://analyticsdata.googleapis.com/v1beta";
const ANALYTICS_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";

/// Hard cap on returned rows, matching the Data API maximum.
pub const ROW_LIMIT: u64 = 250_000;

/// Reports with at least this many rows are only delivered as a file.
pub const EMBED_ROW_THRESHOLD: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct Ga4ReportArgs {
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    /// (start, end) pairs, dates formatted YYYY-MM-DD.
    pub date_ranges: Vec<(String, String)>,
    pub property_id: String,
    pub stream_id: String,
    /// Dimension name -> full-match regex. Every entry is forwarded to the
    /// API, in dimension-name order (the JSON object loses caller order
    /// before it reaches the tool; under AND the order carries no meaning).
    /// An unknown field name surfaces as the API's own error.
    #[serde(default)]
    pub dimension_regex_filters: BTreeMap<String, String>,
    #[serde(default)]
    pub sort_by_metrics: Vec<String>,
    #[serde(default)]
    pub ascending_bools: Vec<bool>,
}

/// Build the `runReport` request body.
///
/// The dimension filter is always the AND of the stream-ID equality filter
/// and one FULL_REGEXP filter per regex entry; an empty map yields the
/// stream filter alone.
pub fn build_report_request(args: &Ga4ReportArgs) -> Value {
    let mut expressions = vec![json!({
        "filter": {
            "fieldName": "streamID",
            "stringFilter": { "value": args.stream_id },
        }
    })];
    for (dimension, pattern) in &args.dimension_regex_filters {
        expressions.push(json!({
            "filter": {
                "fieldName": dimension,
                "stringFilter": { "matchType": "FULL_REGEXP", "value": pattern },
            }
        }));
    }

    json!({
        "dimensions": args.dimensions.iter().map(|d| json!({ "name": d })).collect::<Vec<_>>(),
        "metrics": args.metrics.iter().map(|m| json!({ "name": m })).collect::<Vec<_>>(),
        "dateRanges": args
            .date_ranges
            .iter()
            .map(|(start, end)| json!({ "startDate": start, "endDate": end }))
            .collect::<Vec<_>>(),
        "dimensionFilter": { "andGroup": { "expressions": expressions } },
        "limit": ROW_LIMIT.to_string(),
    })
}

// ── Response parsing ────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunReportResponse {
    pub dimension_headers: Vec<ReportHeader>,
    pub metric_headers: Vec<ReportHeader>,
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportHeader {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportRow {
    pub dimension_values: Vec<ReportCell>,
    pub metric_values: Vec<ReportCell>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportCell {
    #[serde(default)]
    pub value: String,
}

// ── In-memory report table ──────────────────────────────────────────────────

/// Flattened report: dimension columns first, then metric columns.
#[derive(Debug, Clone)]
pub struct ReportTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn from_response(response: &RunReportResponse) -> Self {
        let columns = response
            .dimension_headers
            .iter()
            .chain(response.metric_headers.iter())
            .map(|h| h.name.clone())
            .collect();
        let rows = response
            .rows
            .iter()
            .map(|row| {
                row.dimension_values
                    .iter()
                    .chain(row.metric_values.iter())
                    .map(|cell| cell.value.clone())
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    /// Stable multi-key sort by metric columns, applied in memory after the
    /// fetch. Numeric comparison when both cells parse as numbers,
    /// lexicographic otherwise.
    pub fn sort_by(&mut self, keys: &[String], ascending: &[bool]) -> Result<(), ToolError> {
        if !ascending.is_empty() && ascending.len() != keys.len() {
            return Err(ToolError::InvalidArguments(format!(
                "ascending_bools has {} entries but sort_by_metrics has {}",
                ascending.len(),
                keys.len(),
            )));
        }

        let mut indexed_keys = Vec::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            let column = self.columns.iter().position(|c| c == key).ok_or_else(|| {
                ToolError::InvalidArguments(format!(
                    "sort metric '{key}' is not part of the report columns"
                ))
            })?;
            let asc = ascending.get(i).copied().unwrap_or(true);
            indexed_keys.push((column, asc));
        }

        // Stable sort applied per key in reverse gives multi-key ordering.
        for &(column, asc) in indexed_keys.iter().rev() {
            self.rows.sort_by(|a, b| {
                let ord = compare_cells(&a[column], &b[column]);
                if asc { ord } else { ord.reverse() }
            });
        }
        Ok(())
    }

    /// Plain-text rendering with padded columns, for inline replies.
    pub fn format_table(&self) -> String {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.len()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() && cell.len() > widths[i] {
                    widths[i] = cell.len();
                }
            }
        }

        let render_row = |cells: &[String]| -> String {
            cells
                .iter()
                .enumerate()
                .map(|(i, cell)| format!("{:<width$}", cell, width = widths.get(i).copied().unwrap_or(0)))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut lines = vec![render_row(&self.columns)];
        for row in &self.rows {
            lines.push(render_row(row));
        }
        lines.join("\n")
    }

    /// Write the table to an .xlsx file, header row first.
    pub fn write_xlsx(&self, path: &Path) -> Result<(), ToolError> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let worksheet = workbook.add_worksheet();

        for (col, name) in self.columns.iter().enumerate() {
            worksheet
                .write_string(0, col as u16, name)
                .map_err(xlsx_error)?;
        }
        for (row_idx, row) in self.rows.iter().enumerate() {
            for (col, cell) in row.iter().enumerate() {
                worksheet
                    .write_string(row_idx as u32 + 1, col as u16, cell)
                    .map_err(xlsx_error)?;
            }
        }

        workbook.save(path).map_err(xlsx_error)?;
        Ok(())
    }
}

fn xlsx_error(e: rust_xlsxwriter::XlsxError) -> ToolError {
    ToolError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
}

fn compare_cells(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

/// Export file name: `{property_id}-{stream_id}_report_{DD-MM-YYYY HH-MM-SS}.xlsx`.
pub fn report_file_name(property_id: &str, stream_id: &str, at: DateTime<Local>) -> String {
    format!(
        "{property_id}-{stream_id}_report_{}.xlsx",
        at.format("%d-%m-%Y %H-%M-%S"),
    )
}

pub(crate) async fn exec(toolbox: &Toolbox, args: &Value) -> Result<String, ToolError> {
    let args: Ga4ReportArgs = serde_json::from_value(args.clone())
        .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

    let body = build_report_request(&args);
    let token = auth::fetch_access_token(
        toolbox.http(),
        &toolbox.config().service_account_path,
        &[ANALYTICS_SCOPE],
    )
    .await?;

    let url = format!(
        "{ANALYTICS_DATA_BASE}/properties/{}:runReport",
        args.property_id
    );
    let resp = toolbox
        .http()
        .post(&url)
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .map_err(|e| ToolError::Api(format!("runReport request failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let detail = resp.text().await.unwrap_or_default();
        return Err(ToolError::Api(format!("runReport returned {status} — {detail}")));
    }

    let response: RunReportResponse = resp
        .json()
        .await
        .map_err(|e| ToolError::Api(format!("failed to parse runReport response: {e}")))?;

    let mut table = ReportTable::from_response(&response);

    let reports_dir = &toolbox.config().reports_dir;
    std::fs::create_dir_all(reports_dir)?;
    let file_path = reports_dir.join(report_file_name(
        &args.property_id,
        &args.stream_id,
        Local::now(),
    ));

    // The artifact always holds the full, unsorted result.
    table.write_xlsx(&file_path)?;

    if !args.sort_by_metrics.is_empty() {
        table.sort_by(&args.sort_by_metrics, &args.ascending_bools)?;
    }

    Ok(render_report_reply(&table, &file_path))
}

/// Reply text for a fetched report. Small reports embed the tabular data;
/// from [`EMBED_ROW_THRESHOLD`] rows up the reply carries the artifact path
/// only, never the data.
pub fn render_report_reply(table: &ReportTable, artifact: &Path) -> String {
    if table.rows.len() < EMBED_ROW_THRESHOLD {
        format!(
            "Congratulations! The tool ran successfully.\n\n\
             You can see the Excel export here: {}\n\
             The report has less than 50 rows. Here is the report.\n\n{}\n\n\
             Stop here and convey accordingly.",
            artifact.display(),
            table.format_table(),
        )
    } else {
        format!(
            "Congratulations! The tool ran successfully.\n\n\
             You can see the Excel export here: {}\n\
             The report has more than 50 rows. Hence, it is only available in \
             the above Excel file. Stop here and convey accordingly.",
            artifact.display(),
        )
    }
}
