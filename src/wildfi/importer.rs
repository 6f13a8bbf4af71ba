//! Import of raw telemetry into the four pipeline tables.

use chrono::{DateTime, FixedOffset};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use super::burst;
use super::checker;
use super::classifier::{self, LocationOrder};
use super::dba;
use super::merge;
use super::models::{
    BadRow, Datasets, Observation, ObservationKind, ProximityEdge, RawObservation, SensorRecord,
    TagMetadata,
};
use super::proximity;
use super::raw;
use crate::config::{Config, ImportOptions};
use crate::error::AppResult;

/// Epoch seconds as a timestamp in `options.convert_to_tz` (UTC when unset).
pub fn convert_timestamp(utc_timestamp: i64, options: &ImportOptions) -> Option<DateTime<FixedOffset>> {
    let utc = DateTime::from_timestamp(utc_timestamp, 0)?;
    Some(match options.convert_to_tz {
        Some(tz) => utc.with_timezone(&tz).fixed_offset(),
        None => utc.fixed_offset(),
    })
}

fn sensor_record(record: &RawObservation, parse_acc: bool) -> Option<SensorRecord> {
    let acc_in_g_burst = record.acc_in_g_burst.clone()?;
    let acc_summary = if parse_acc {
        let samples = burst::decode_numeric_burst(Some(&acc_in_g_burst)).ok()?;
        dba::summarize(&samples)
    } else {
        None
    };

    Some(SensorRecord {
        temperature_in_deg_cel: record.temperature_in_deg_cel?,
        humidity_in_percent: record.humidity_in_percent?,
        pressure_in_hpa: record.pressure_in_hpa?,
        acc_in_g_burst,
        acc_summary,
    })
}

/// Type one raw record from the payloads it carries: sensors and a fix make
/// a combined observation, either one alone its own kind. `None` when neither
/// payload is complete or the timestamp is out of range.
pub fn import_record(record: &RawObservation, options: &ImportOptions) -> Option<Observation> {
    let tag_id = record.tag_id.clone()?;
    let utc_timestamp = record.utc_timestamp?;
    let time = convert_timestamp(utc_timestamp, options)?;

    let kind = match (sensor_record(record, options.parse_acc), record.gps_fix()) {
        (Some(sensors), Some(fix)) => ObservationKind::Combined {
            sensors,
            fix,
            gps_row: None,
            gps_time_diff: 0,
        },
        (Some(sensors), None) => ObservationKind::Proximity { sensors },
        (None, Some(fix)) => ObservationKind::Gps { fix },
        (None, None) => return None,
    };

    Some(Observation {
        row: record.row,
        filename: record.filename.clone(),
        csv_index: record.csv_index,
        tag_id,
        utc_timestamp,
        utc_date: record.utc_date.clone(),
        time,
        kind,
        prox_id_burst: record.prox_id_burst.clone().unwrap_or_default(),
        prox_rssi_burst: record.prox_rssi_burst.clone().unwrap_or_default(),
        prox_count: 0,
        location_category: None,
    })
}

/// Type cleaned raw records, merge GPS points if enabled and count contacts.
///
/// Records that cannot be typed are skipped; callers normally pass only rows
/// the checker accepted, so skips indicate a checker/importer mismatch.
pub fn import_observations(records: &[RawObservation], options: &ImportOptions) -> Vec<Observation> {
    let mut observations: Vec<Observation> = records
        .iter()
        .filter_map(|r| import_record(r, options))
        .collect();

    let skipped = records.len() - observations.len();
    if skipped > 0 {
        tracing::warn!(skipped, "Records could not be typed and were skipped");
    }

    if options.merge_gps_points {
        observations = merge::merge_gps_points(
            observations,
            options.merge_max_gap_seconds,
            options.merge_tie_break,
        );
    }

    let counts = proximity::extract(&observations).counts_by_row();
    for obs in &mut observations {
        obs.prox_count = counts.get(&obs.row).copied().unwrap_or(0);
    }

    observations
}

/// Attach per-tag row counts of the main table to the metadata.
pub fn count_rows(tags: &mut [TagMetadata], observations: &[Observation]) {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for obs in observations {
        let entry = counts.entry(obs.tag_id.as_str()).or_default();
        if obs.has_gps() {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    for tag in tags.iter_mut() {
        let (with_gps, only_prox) = counts.get(tag.tag_id.as_str()).copied().unwrap_or_default();
        tag.prox_and_gps_rows = with_gps;
        tag.only_prox_rows = only_prox;
        tag.total_rows = with_gps + only_prox;
    }
}

/// Label every observation and edge with its resolved location.
pub fn apply_locations(observations: &mut [Observation], edges: &mut [ProximityEdge], order: &LocationOrder) {
    let classification = classifier::classify_location(observations, edges, order);
    for (obs, label) in observations.iter_mut().zip(classification.observations) {
        obs.location_category = Some(label);
    }
    for (edge, label) in edges.iter_mut().zip(classification.edges) {
        edge.location_category = Some(label);
    }
}

/// Run the full import: metadata, raw files, checks, typing, edges, counts
/// and locations.
///
/// # Errors
///
/// Unreadable or unparsable input files and missing required columns abort
/// the import. Row-level problems end up in [`Datasets::bad_rows`].
pub fn run_import(config: &Config) -> AppResult<Datasets> {
    let started = Instant::now();

    let mut tags = raw::read_tag_metadata(&config.tag_meta_file)?;
    let raw_rows = raw::read_raw_data(&config.data_dir, config.raw_delimiter)?;

    let known: HashSet<String> = tags.iter().map(|t| t.tag_id.clone()).collect();
    let flags = checker::check_data(&raw_rows, Some(&known), false);

    let mut bad_rows = Vec::new();
    let mut clean = Vec::with_capacity(raw_rows.len());
    for (record, flag) in raw_rows.into_iter().zip(flags) {
        if flag.any_problems {
            bad_rows.push(BadRow {
                flags: flag,
                record,
            });
        } else {
            clean.push(record);
        }
    }

    let mut main = import_observations(&clean, &config.import);
    let mut edges = proximity::extract_edges(&main);

    count_rows(&mut tags, &main);

    let order = LocationOrder::from_tags(&config.locations, &tags);
    apply_locations(&mut main, &mut edges, &order);

    tracing::info!(
        bad_rows = bad_rows.len(),
        observations = main.len(),
        edges = edges.len(),
        tags = tags.len(),
        locations = ?order.labels(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Import complete"
    );

    Ok(Datasets {
        bad_rows: Arc::new(bad_rows),
        main: Arc::new(main),
        edges: Arc::new(edges),
        tags: Arc::new(tags),
    })
}
