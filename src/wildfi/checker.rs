//! Data quality checks on raw telemetry.
//!
//! Produces one [`QualityFlag`] per raw record. Nothing here fails: every
//! problem is recorded on the flag and the importer decides what to drop.

use chrono::DateTime;
use std::collections::{HashMap, HashSet};

use super::burst;
use super::models::{QualityFlag, RawObservation, RowKind};
use super::proximity;

/// Fields a proximity record must carry. The proximity bursts themselves are
/// left out because an empty burst (no contacts) is valid.
pub const PROX_COLUMNS: [&str; 7] = [
    "tagId",
    "utcTimestamp",
    "utcDate",
    "temperatureInDegCel",
    "humidityInPercent",
    "pressureInHPA",
    "accInGBurst",
];

/// Fields a GPS record must carry.
pub const GPS_COLUMNS: [&str; 7] = [
    "tagId",
    "utcTimestamp",
    "utcDate",
    "lat",
    "lon",
    "hdop",
    "ttfSeconds",
];

fn is_present(record: &RawObservation, column: &str) -> bool {
    match column {
        "tagId" => record.tag_id.is_some(),
        // Out-of-range epochs cannot be typed and count as missing
        "utcTimestamp" => record
            .utc_timestamp
            .is_some_and(|ts| DateTime::from_timestamp(ts, 0).is_some()),
        "utcDate" => record.utc_date.is_some(),
        "temperatureInDegCel" => record.temperature_in_deg_cel.is_some(),
        "humidityInPercent" => record.humidity_in_percent.is_some(),
        "pressureInHPA" => record.pressure_in_hpa.is_some(),
        "accInGBurst" => record.acc_in_g_burst.is_some(),
        "lat" => record.lat.is_some(),
        "lon" => record.lon.is_some(),
        "hdop" => record.hdop.is_some(),
        "ttfSeconds" => record.ttf_seconds.is_some(),
        "proxIdBurst" => record.prox_id_burst.is_some(),
        "proxRssiBurst" => record.prox_rssi_burst.is_some(),
        _ => false,
    }
}

/// Names of `columns` that are missing in `record`, in column order.
pub fn missing_columns(record: &RawObservation, columns: &[&str]) -> Vec<String> {
    columns
        .iter()
        .filter(|c| !is_present(record, c))
        .map(|c| (*c).to_string())
        .collect()
}

/// Proximity record iff more proximity fields than GPS fields are present.
pub fn classify_row(record: &RawObservation) -> RowKind {
    let prox = PROX_COLUMNS.iter().filter(|c| is_present(record, c)).count();
    let gps = GPS_COLUMNS.iter().filter(|c| is_present(record, c)).count();
    if prox > gps {
        RowKind::Proximity
    } else {
        RowKind::Gps
    }
}

/// `true` when the acceleration burst is present but does not decode into triples.
pub fn acc_malformed(record: &RawObservation) -> bool {
    record.acc_in_g_burst.is_some()
        && burst::decode_numeric_burst(record.acc_in_g_burst.as_deref()).is_err()
}

/// Check every record.
///
/// `known_tag_ids` enables the unknown-sender check; an empty set is treated
/// like `None`. With `only_return_bad_data` the result holds only rows with
/// problems, otherwise it is aligned with `records`.
pub fn check_data(
    records: &[RawObservation],
    known_tag_ids: Option<&HashSet<String>>,
    only_return_bad_data: bool,
) -> Vec<QualityFlag> {
    let mut flags: Vec<QualityFlag> = records
        .iter()
        .map(|r| QualityFlag::new(r.row, classify_row(r)))
        .collect();

    // Duplicate records: same (utcTimestamp, tagId)
    let mut group_sizes: HashMap<(Option<i64>, Option<&str>), usize> = HashMap::new();
    for r in records {
        *group_sizes
            .entry((r.utc_timestamp, r.tag_id.as_deref()))
            .or_insert(0) += 1;
    }
    let mut seen: HashSet<(Option<i64>, Option<&str>)> = HashSet::new();
    for (r, flag) in records.iter().zip(flags.iter_mut()) {
        let key = (r.utc_timestamp, r.tag_id.as_deref());
        flag.duplicate = group_sizes.get(&key).copied().unwrap_or(0) > 1;
        flag.duplicate_except_first = !seen.insert(key);
    }

    // Missing fields, judged against the record's own kind
    for (r, flag) in records.iter().zip(flags.iter_mut()) {
        match flag.kind {
            RowKind::Proximity => flag.missing_prox_cols = missing_columns(r, &PROX_COLUMNS),
            RowKind::Gps => flag.missing_gps_cols = missing_columns(r, &GPS_COLUMNS),
        }
        flag.acc_malformed = acc_malformed(r);
    }

    // Proximity bursts
    let extraction = proximity::extract(records);
    for (flag, well_formed) in flags.iter_mut().zip(&extraction.well_formed) {
        flag.prox_malformed = !well_formed;
    }

    let index_of: HashMap<usize, usize> = flags
        .iter()
        .enumerate()
        .map(|(i, f)| (f.row, i))
        .collect();

    // Senders that are not known tags
    match known_tag_ids {
        Some(known) if !known.is_empty() => {
            for edge in extraction.edges.iter().filter(|e| !known.contains(&e.send_id)) {
                if let Some(&i) = index_of.get(&edge.row) {
                    flags[i].bad_prox_ids.push(edge.send_id.clone());
                    flags[i].bad_prox_count += 1;
                }
            }
        }
        _ => tracing::debug!("No known tag ids, skipping unknown sender check"),
    }

    // Senders seen more than once within the same record
    let mut sender_counts: HashMap<(&str, usize, &str), usize> = HashMap::new();
    for edge in &extraction.edges {
        *sender_counts
            .entry((edge.filename.as_str(), edge.csv_index, edge.send_id.as_str()))
            .or_insert(0) += 1;
    }
    for edge in &extraction.edges {
        let count = sender_counts[&(edge.filename.as_str(), edge.csv_index, edge.send_id.as_str())];
        if count < 2 {
            continue;
        }
        if let Some(&i) = index_of.get(&edge.row) {
            let flag = &mut flags[i];
            flag.duplicate_prox_count += 1;
            if !flag.duplicate_prox_ids.contains(&edge.send_id) {
                flag.duplicate_prox_ids.push(edge.send_id.clone());
            }
        }
    }

    for (r, flag) in records.iter().zip(flags.iter_mut()) {
        flag.duplicate_prox_ids.sort_unstable();
        flag.any_problems = flag.has_problems();
        if flag.any_problems {
            tracing::debug!(
                file = %r.filename,
                csv_index = r.csv_index,
                tag_id = r.tag_id.as_deref().unwrap_or_default(),
                duplicate = flag.duplicate,
                prox_malformed = flag.prox_malformed,
                acc_malformed = flag.acc_malformed,
                "Row flagged"
            );
        }
    }

    let bad = flags.iter().filter(|f| f.any_problems).count();
    tracing::info!(
        rows = flags.len(),
        bad,
        duplicates = flags.iter().filter(|f| f.duplicate).count(),
        acc_malformed = flags.iter().filter(|f| f.acc_malformed).count(),
        prox_malformed = flags.iter().filter(|f| f.prox_malformed).count(),
        unknown_senders = flags.iter().filter(|f| f.bad_prox_count > 0).count(),
        repeated_senders = flags.iter().filter(|f| f.duplicate_prox_count > 0).count(),
        "Data check complete"
    );

    if only_return_bad_data {
        flags.retain(|f| f.any_problems);
    }
    flags
}
