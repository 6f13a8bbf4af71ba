//! Record builders shared by the integration tests.
#![allow(dead_code)]

use wildfi_pipeline::config::ImportOptions;
use wildfi_pipeline::wildfi::importer;
use wildfi_pipeline::wildfi::{Observation, RawObservation};

pub const T0: i64 = 1_679_000_000;

/// A complete proximity record of `tag` at `ts` with the given contact bursts.
pub fn prox_raw(row: usize, tag: &str, ts: i64, ids: &str, rssis: &str) -> RawObservation {
    RawObservation {
        row,
        filename: "tag.csv".to_string(),
        csv_index: row,
        tag_id: Some(tag.to_string()),
        utc_timestamp: Some(ts),
        utc_date: Some("2023-03-16 20:53:20".to_string()),
        temperature_in_deg_cel: Some(12.5),
        humidity_in_percent: Some(88.0),
        pressure_in_hpa: Some(1001.2),
        acc_in_g_burst: Some("0.1 0.2 0.3 0.1 0.2 0.3".to_string()),
        prox_id_burst: Some(ids.to_string()).filter(|s| !s.is_empty()),
        prox_rssi_burst: Some(rssis.to_string()).filter(|s| !s.is_empty()),
        ..RawObservation::default()
    }
}

/// A complete GPS record of `tag` at `ts`.
pub fn gps_raw(row: usize, tag: &str, ts: i64) -> RawObservation {
    RawObservation {
        row,
        filename: "tag.csv".to_string(),
        csv_index: row,
        tag_id: Some(tag.to_string()),
        utc_timestamp: Some(ts),
        utc_date: Some("2023-03-16 20:53:20".to_string()),
        lat: Some(42.66),
        lon: Some(23.38),
        hdop: Some(1.2),
        ttf_seconds: Some(14.0),
        ..RawObservation::default()
    }
}

pub fn observation(record: &RawObservation) -> Observation {
    importer::import_record(record, &ImportOptions::default()).expect("record should import")
}
