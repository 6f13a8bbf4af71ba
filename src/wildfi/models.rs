use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use super::burst::{self, BurstError};
use super::dba::{self, AccSummary};

/// Which group of required fields a raw record is judged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowKind {
    /// Environmental + acceleration + proximity burst record.
    Proximity,
    /// GPS fix record.
    Gps,
}

/// One raw telemetry record as read from a source file. Bursts stay encoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawObservation {
    /// Position in the concatenated raw table. Stable key for flags and edges.
    pub row: usize,
    pub filename: String,
    /// 0-based record number within `filename`.
    pub csv_index: usize,

    pub tag_id: Option<String>,
    pub utc_timestamp: Option<i64>,
    pub utc_date: Option<String>,

    pub temperature_in_deg_cel: Option<f64>,
    pub humidity_in_percent: Option<f64>,
    #[serde(rename = "pressureInHPA")]
    pub pressure_in_hpa: Option<f64>,
    pub acc_in_g_burst: Option<String>,

    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub hdop: Option<f64>,
    pub ttf_seconds: Option<f64>,

    pub prox_id_burst: Option<String>,
    pub prox_rssi_burst: Option<String>,
}

impl RawObservation {
    /// The record's GPS fix, if all four GPS fields are present.
    pub fn gps_fix(&self) -> Option<GpsFix> {
        Some(GpsFix {
            lat: self.lat?,
            lon: self.lon?,
            hdop: self.hdop?,
            ttf_seconds: self.ttf_seconds?,
        })
    }
}

/// A GPS fix with all of its required fields present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsFix {
    pub lat: f64,
    pub lon: f64,
    pub hdop: f64,
    pub ttf_seconds: f64,
}

/// Environmental and acceleration payload of a proximity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorRecord {
    pub temperature_in_deg_cel: f64,
    pub humidity_in_percent: f64,
    #[serde(rename = "pressureInHPA")]
    pub pressure_in_hpa: f64,
    pub acc_in_g_burst: String,
    /// Filled on import when acceleration parsing is enabled.
    pub acc_summary: Option<AccSummary>,
}

impl SensorRecord {
    /// Decoded acceleration samples (x, y, z in g).
    pub fn acc_samples(&self) -> Result<Vec<[f64; 3]>, BurstError> {
        burst::decode_numeric_burst(Some(&self.acc_in_g_burst))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ObservationKind {
    Gps {
        fix: GpsFix,
    },
    Proximity {
        sensors: SensorRecord,
    },
    /// A proximity record with a GPS fix, either recorded together or merged
    /// from a separate GPS record of the same tag.
    #[serde(rename_all = "camelCase")]
    Combined {
        sensors: SensorRecord,
        fix: GpsFix,
        /// Raw row of the merged GPS record (`None` when recorded together).
        gps_row: Option<usize>,
        /// GPS time minus proximity time, in seconds.
        gps_time_diff: i64,
    },
}

/// A cleaned, typed observation of the main table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub row: usize,
    pub filename: String,
    pub csv_index: usize,
    pub tag_id: String,
    pub utc_timestamp: i64,
    pub utc_date: Option<String>,
    /// `utc_timestamp` in the configured target timezone.
    pub time: DateTime<FixedOffset>,
    #[serde(flatten)]
    pub kind: ObservationKind,
    /// Empty when the record saw no contacts. GPS records may carry contacts too.
    pub prox_id_burst: String,
    pub prox_rssi_burst: String,
    /// Number of proximity contacts decoded from this observation.
    pub prox_count: usize,
    pub location_category: Option<String>,
}

impl Observation {
    /// Whether a GPS fix is attached.
    pub fn has_gps(&self) -> bool {
        matches!(
            self.kind,
            ObservationKind::Gps { .. } | ObservationKind::Combined { .. }
        )
    }

    pub fn gps_fix(&self) -> Option<&GpsFix> {
        match &self.kind {
            ObservationKind::Gps { fix } | ObservationKind::Combined { fix, .. } => Some(fix),
            ObservationKind::Proximity { .. } => None,
        }
    }

    pub fn sensors(&self) -> Option<&SensorRecord> {
        match &self.kind {
            ObservationKind::Proximity { sensors } | ObservationKind::Combined { sensors, .. } => {
                Some(sensors)
            }
            ObservationKind::Gps { .. } => None,
        }
    }

    pub fn has_contacts(&self) -> bool {
        !self.prox_id_burst.trim().is_empty()
    }

    /// Sender ids of the proximity burst, sorted and space separated.
    pub fn prox_ids_sorted(&self) -> String {
        let mut ids = burst::decode_list_burst(Some(&self.prox_id_burst));
        ids.sort_unstable();
        burst::encode_list_burst(&ids)
    }

    /// Acceleration summary, computed on demand when it was not parsed on import.
    pub fn acc_summary(&self) -> Option<AccSummary> {
        let sensors = self.sensors()?;
        if let Some(summary) = sensors.acc_summary {
            return Some(summary);
        }
        sensors.acc_samples().ok().and_then(|s| dba::summarize(&s))
    }
}

/// A directed radio contact decoded from a proximity burst.
///
/// `T` is the time type inherited from the source record: epoch seconds for
/// raw records during checking, a zoned timestamp for the main table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximityEdge<T = DateTime<FixedOffset>> {
    /// Raw row of the observation this edge was decoded from.
    pub row: usize,
    pub time: T,
    pub recv_id: String,
    pub send_id: String,
    pub rssi: i16,
    pub filename: String,
    pub csv_index: usize,
    #[serde(rename = "GPS")]
    pub gps: bool,
    pub location_category: Option<String>,
}

/// Quality-control result for one raw record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityFlag {
    pub row: usize,
    pub kind: RowKind,
    pub duplicate: bool,
    pub duplicate_except_first: bool,
    #[serde(rename = "missingProxCols")]
    pub missing_prox_cols: Vec<String>,
    #[serde(rename = "missingGPSCols")]
    pub missing_gps_cols: Vec<String>,
    pub acc_malformed: bool,
    pub prox_malformed: bool,
    pub bad_prox_ids: Vec<String>,
    pub bad_prox_count: usize,
    pub duplicate_prox_ids: Vec<String>,
    pub duplicate_prox_count: usize,
    pub any_problems: bool,
}

impl QualityFlag {
    pub(crate) fn new(row: usize, kind: RowKind) -> Self {
        Self {
            row,
            kind,
            duplicate: false,
            duplicate_except_first: false,
            missing_prox_cols: Vec::new(),
            missing_gps_cols: Vec::new(),
            acc_malformed: false,
            prox_malformed: false,
            bad_prox_ids: Vec::new(),
            bad_prox_count: 0,
            duplicate_prox_ids: Vec::new(),
            duplicate_prox_count: 0,
            any_problems: false,
        }
    }

    /// OR of every individual problem condition.
    pub fn has_problems(&self) -> bool {
        self.duplicate
            || !self.missing_prox_cols.is_empty()
            || !self.missing_gps_cols.is_empty()
            || self.acc_malformed
            || self.prox_malformed
            || self.bad_prox_count > 0
            || self.duplicate_prox_count > 0
    }
}

/// A flagged raw record, kept for operator review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadRow {
    pub flags: QualityFlag,
    pub record: RawObservation,
}

/// Metadata of one known tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagMetadata {
    pub tag_id: String,
    /// Only set for gateways.
    pub location_category: Option<String>,
    pub location_x: Option<f64>,
    pub location_y: Option<f64>,
    #[serde(rename = "Type")]
    pub tag_type: Option<String>,
    pub location: Option<String>,
    pub total_rows: usize,
    pub prox_and_gps_rows: usize,
    pub only_prox_rows: usize,
}

/// The four tables produced by one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct Datasets {
    pub bad_rows: Arc<Vec<BadRow>>,
    pub main: Arc<Vec<Observation>>,
    pub edges: Arc<Vec<ProximityEdge>>,
    pub tags: Arc<Vec<TagMetadata>>,
}

impl Datasets {
    /// Observations recorded by any of `tag_ids`. May be empty.
    pub fn observations_for_tags(&self, tag_ids: &[&str]) -> Vec<&Observation> {
        let wanted: HashSet<&str> = tag_ids.iter().copied().collect();
        self.main
            .iter()
            .filter(|o| wanted.contains(o.tag_id.as_str()))
            .collect()
    }

    /// Edges whose receiver and sender are both in `tag_ids`. May be empty.
    pub fn edges_between(&self, tag_ids: &[&str]) -> Vec<&ProximityEdge> {
        let wanted: HashSet<&str> = tag_ids.iter().copied().collect();
        self.edges
            .iter()
            .filter(|e| wanted.contains(e.recv_id.as_str()) && wanted.contains(e.send_id.as_str()))
            .collect()
    }

    pub fn tag(&self, tag_id: &str) -> Option<&TagMetadata> {
        self.tags.iter().find(|t| t.tag_id == tag_id)
    }
}
