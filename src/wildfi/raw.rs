//! Reading raw telemetry and tag metadata files.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::models::{RawObservation, TagMetadata};
use crate::error::{AppError, AppResult};

/// Columns every raw telemetry file must provide.
pub const RAW_COLUMNS: [&str; 13] = [
    "tagId",
    "utcTimestamp",
    "utcDate",
    "temperatureInDegCel",
    "humidityInPercent",
    "pressureInHPA",
    "accInGBurst",
    "lat",
    "lon",
    "hdop",
    "ttfSeconds",
    "proxIdBurst",
    "proxRssiBurst",
];

/// Columns the tag metadata file must provide.
pub const META_COLUMNS: [&str; 6] = [
    "tagId",
    "locationCategory",
    "locationX",
    "locationY",
    "Type",
    "location",
];

const NA_VALUES: [&str; 9] = ["NA", "N/A", "NaN", "nan", "null", "NULL", "None", "<NA>", "-nan"];

/// Trimmed cell content, or `None` for blank and NA cells.
pub fn na_string(cell: Option<String>) -> Option<String> {
    let cell = cell?;
    let trimmed = cell.trim();
    if trimmed.is_empty() || NA_VALUES.contains(&trimmed) {
        None
    } else if trimmed.len() == cell.len() {
        Some(cell)
    } else {
        Some(trimmed.to_string())
    }
}

pub fn na_f64(cell: Option<String>) -> Option<f64> {
    na_string(cell)?.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Epoch seconds; integral floats such as `1679000000.0` are accepted.
pub fn na_i64(cell: Option<String>) -> Option<i64> {
    let cell = na_string(cell)?;
    if let Ok(v) = cell.parse::<i64>() {
        return Some(v);
    }
    cell.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.fract() == 0.0)
        .map(|v| v as i64)
}

/// Every cell as an optional string; typed conversion happens afterwards so
/// that a bad value in one cell never fails the whole file. Cells missing from
/// a short record are `None`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawRecord {
    tag_id: Option<String>,
    utc_timestamp: Option<String>,
    utc_date: Option<String>,
    temperature_in_deg_cel: Option<String>,
    humidity_in_percent: Option<String>,
    #[serde(rename = "pressureInHPA")]
    pressure_in_hpa: Option<String>,
    acc_in_g_burst: Option<String>,
    lat: Option<String>,
    lon: Option<String>,
    hdop: Option<String>,
    ttf_seconds: Option<String>,
    prox_id_burst: Option<String>,
    prox_rssi_burst: Option<String>,
}

impl RawRecord {
    fn into_observation(self, row: usize, filename: &str, csv_index: usize) -> RawObservation {
        RawObservation {
            row,
            filename: filename.to_string(),
            csv_index,
            tag_id: na_string(self.tag_id),
            utc_timestamp: na_i64(self.utc_timestamp),
            utc_date: na_string(self.utc_date),
            temperature_in_deg_cel: na_f64(self.temperature_in_deg_cel),
            humidity_in_percent: na_f64(self.humidity_in_percent),
            pressure_in_hpa: na_f64(self.pressure_in_hpa),
            acc_in_g_burst: na_string(self.acc_in_g_burst),
            lat: na_f64(self.lat),
            lon: na_f64(self.lon),
            hdop: na_f64(self.hdop),
            ttf_seconds: na_f64(self.ttf_seconds),
            prox_id_burst: na_string(self.prox_id_burst),
            prox_rssi_burst: na_string(self.prox_rssi_burst),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MetaRecord {
    tag_id: Option<String>,
    location_category: Option<String>,
    location_x: Option<String>,
    location_y: Option<String>,
    #[serde(rename = "Type")]
    tag_type: Option<String>,
    location: Option<String>,
}

fn check_columns(path: &Path, headers: &csv::StringRecord, required: &[&str]) -> AppResult<()> {
    let missing: Vec<String> = required
        .iter()
        .filter(|col| !headers.iter().any(|h| h.trim() == **col))
        .map(|col| (*col).to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::MissingColumns {
            path: path.to_path_buf(),
            columns: missing,
        })
    }
}

fn open_reader(path: &Path, delimiter: u8) -> AppResult<csv::Reader<std::fs::File>> {
    let file = std::fs::File::open(path).map_err(|e| AppError::io(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(file);

    // Parse headers eagerly so an unreadable file fails before any row is read.
    reader.headers().map_err(|e| AppError::csv(path, e))?;
    Ok(reader)
}

/// Read the semicolon separated tag metadata file.
///
/// Rows without a tag id are skipped; for repeated tag ids the first row wins.
///
/// # Errors
///
/// Fails when the file cannot be read or parsed, or lacks a required column.
pub fn read_tag_metadata(path: &Path) -> AppResult<Vec<TagMetadata>> {
    let mut reader = open_reader(path, b';')?;
    let headers = reader.headers().map_err(|e| AppError::csv(path, e))?.clone();
    check_columns(path, &headers, &META_COLUMNS)?;

    let mut tags: Vec<TagMetadata> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut duplicates = 0usize;

    for record in reader.deserialize::<MetaRecord>() {
        let record = record.map_err(|e| AppError::csv(path, e))?;
        let Some(tag_id) = na_string(record.tag_id) else {
            tracing::debug!(file = %path.display(), "Skipping metadata row without tagId");
            continue;
        };
        if !seen.insert(tag_id.clone()) {
            duplicates += 1;
            continue;
        }

        tags.push(TagMetadata {
            tag_id,
            location_category: na_string(record.location_category),
            location_x: na_f64(record.location_x),
            location_y: na_f64(record.location_y),
            tag_type: na_string(record.tag_type),
            location: na_string(record.location),
            total_rows: 0,
            prox_and_gps_rows: 0,
            only_prox_rows: 0,
        });
    }

    tracing::info!(
        file = %path.display(),
        tags = tags.len(),
        duplicates,
        "Read tag metadata"
    );
    Ok(tags)
}

/// All `*.csv` files below `dir`, in sorted path order.
///
/// # Errors
///
/// Fails when the directory cannot be traversed.
pub fn discover_source_files(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            AppError::io(path, std::io::Error::other(e.to_string()))
        })?;
        let is_csv = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if entry.file_type().is_file() && is_csv {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Append every record of one source file to `rows`.
///
/// # Errors
///
/// Any read, parse or header failure aborts the file (and the import).
pub fn read_source_file(
    path: &Path,
    filename: &str,
    delimiter: u8,
    rows: &mut Vec<RawObservation>,
) -> AppResult<usize> {
    let mut reader = open_reader(path, delimiter)?;
    let headers = reader.headers().map_err(|e| AppError::csv(path, e))?.clone();
    check_columns(path, &headers, &RAW_COLUMNS)?;

    let before = rows.len();
    for (csv_index, record) in reader.deserialize::<RawRecord>().enumerate() {
        let record = record.map_err(|e| AppError::csv(path, e))?;
        let row = rows.len();
        rows.push(record.into_observation(row, filename, csv_index));
    }
    Ok(rows.len() - before)
}

/// Read and concatenate every source file below `dir`.
///
/// `filename` is the path relative to `dir`; `row` numbers the concatenated table.
///
/// # Errors
///
/// Fails on the first file that cannot be read or parsed.
pub fn read_raw_data(dir: &Path, delimiter: u8) -> AppResult<Vec<RawObservation>> {
    let files = discover_source_files(dir)?;
    if files.is_empty() {
        tracing::warn!(dir = %dir.display(), "No source files found");
    }

    let mut rows = Vec::new();
    for path in &files {
        let filename = path
            .strip_prefix(dir)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();
        let count = read_source_file(path, &filename, delimiter, &mut rows)?;
        tracing::debug!(file = %filename, rows = count, "Read source file");
    }

    tracing::info!(files = files.len(), rows = rows.len(), "Read raw telemetry");
    Ok(rows)
}
