//! Bad-rows report for operator review and spreadsheet export.

use std::path::Path;

use super::models::BadRow;
use crate::error::{AppError, AppResult};

/// Report columns, in export order.
pub const REPORT_COLUMNS: [&str; 13] = [
    "tagId",
    "utcDate",
    "csvIndex",
    "filename",
    "duplicate",
    "missingProxCols",
    "missingGPSCols",
    "accMalformed",
    "proxMalformed",
    "badProxCount",
    "duplicateProxCount",
    "badProxIds",
    "duplicateProxIds",
];

const LIST_SEPARATOR: &str = ", ";

/// One rendered report cell. `flagged` marks cells to highlight: true
/// booleans, positive counts and non-empty lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportCell {
    pub text: String,
    pub flagged: bool,
}

impl ReportCell {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            flagged: false,
        }
    }

    fn flag(value: bool) -> Self {
        Self {
            text: if value { "TRUE" } else { "FALSE" }.to_string(),
            flagged: value,
        }
    }

    fn count(value: usize) -> Self {
        Self {
            text: value.to_string(),
            flagged: value > 0,
        }
    }

    fn list(values: &[String]) -> Self {
        Self {
            text: values.join(LIST_SEPARATOR),
            flagged: !values.is_empty(),
        }
    }
}

/// Render one bad row into [`REPORT_COLUMNS`] order.
pub fn render_row(bad: &BadRow) -> Vec<ReportCell> {
    let r = &bad.record;
    let f = &bad.flags;
    vec![
        ReportCell::plain(r.tag_id.clone().unwrap_or_default()),
        ReportCell::plain(r.utc_date.clone().unwrap_or_default()),
        ReportCell::plain(r.csv_index.to_string()),
        ReportCell::plain(r.filename.clone()),
        ReportCell::flag(f.duplicate),
        ReportCell::list(&f.missing_prox_cols),
        ReportCell::list(&f.missing_gps_cols),
        ReportCell::flag(f.acc_malformed),
        ReportCell::flag(f.prox_malformed),
        ReportCell::count(f.bad_prox_count),
        ReportCell::count(f.duplicate_prox_count),
        ReportCell::list(&f.bad_prox_ids),
        ReportCell::list(&f.duplicate_prox_ids),
    ]
}

/// Render every row that has problems.
pub fn render(bad_rows: &[BadRow]) -> Vec<Vec<ReportCell>> {
    bad_rows
        .iter()
        .filter(|b| b.flags.any_problems)
        .map(render_row)
        .collect()
}

/// Write the report as CSV with a header row.
///
/// # Errors
///
/// Fails when the file cannot be created or written.
pub fn write_csv(bad_rows: &[BadRow], path: &Path) -> AppResult<usize> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| AppError::csv(path, e))?;

    wtr.write_record(REPORT_COLUMNS)
        .map_err(|e| AppError::csv(path, e))?;

    let rows = render(bad_rows);
    for row in &rows {
        wtr.write_record(row.iter().map(|c| c.text.as_str()))
            .map_err(|e| AppError::csv(path, e))?;
    }

    wtr.flush().map_err(|e| AppError::io(path, e))?;
    tracing::info!(path = %path.display(), rows = rows.len(), "Wrote bad rows report");
    Ok(rows.len())
}
