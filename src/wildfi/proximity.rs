//! Proximity graph extraction.
//!
//! Each record's `proxIdBurst`/`proxRssiBurst` pair is exploded into one
//! directed edge per contact: the record's tag is the receiver, the burst
//! entry is the sender.

use chrono::{DateTime, FixedOffset};
use std::collections::HashMap;

use super::burst::{self, ContactBurst};
use super::models::{Observation, ProximityEdge, RawObservation};

/// Anything carrying a pair of proximity bursts.
pub trait ContactSource {
    type Time: Clone;

    fn row(&self) -> usize;
    fn time(&self) -> Self::Time;
    fn receiver(&self) -> &str;
    fn prox_id_burst(&self) -> Option<&str>;
    fn prox_rssi_burst(&self) -> Option<&str>;
    fn filename(&self) -> &str;
    fn csv_index(&self) -> usize;

    fn has_gps(&self) -> bool {
        false
    }
}

impl ContactSource for RawObservation {
    type Time = Option<i64>;

    fn row(&self) -> usize {
        self.row
    }

    fn time(&self) -> Option<i64> {
        self.utc_timestamp
    }

    fn receiver(&self) -> &str {
        self.tag_id.as_deref().unwrap_or_default()
    }

    fn prox_id_burst(&self) -> Option<&str> {
        self.prox_id_burst.as_deref()
    }

    fn prox_rssi_burst(&self) -> Option<&str> {
        self.prox_rssi_burst.as_deref()
    }

    fn filename(&self) -> &str {
        &self.filename
    }

    fn csv_index(&self) -> usize {
        self.csv_index
    }
}

impl ContactSource for Observation {
    type Time = DateTime<FixedOffset>;

    fn row(&self) -> usize {
        self.row
    }

    fn time(&self) -> DateTime<FixedOffset> {
        self.time
    }

    fn receiver(&self) -> &str {
        &self.tag_id
    }

    fn prox_id_burst(&self) -> Option<&str> {
        Some(self.prox_id_burst.as_str())
    }

    fn prox_rssi_burst(&self) -> Option<&str> {
        Some(self.prox_rssi_burst.as_str())
    }

    fn filename(&self) -> &str {
        &self.filename
    }

    fn csv_index(&self) -> usize {
        self.csv_index
    }

    fn has_gps(&self) -> bool {
        Observation::has_gps(self)
    }
}

/// Edges plus one well-formedness flag per input record.
#[derive(Debug, Clone)]
pub struct Extraction<T> {
    pub edges: Vec<ProximityEdge<T>>,
    /// Same length and order as the input; `false` marks a malformed burst pair.
    pub well_formed: Vec<bool>,
}

impl<T> Extraction<T> {
    /// Edge count per source row.
    pub fn counts_by_row(&self) -> HashMap<usize, usize> {
        let mut counts = HashMap::new();
        for edge in &self.edges {
            *counts.entry(edge.row).or_insert(0) += 1;
        }
        counts
    }
}

/// Explode every record's proximity bursts into edges, in record then token order.
///
/// Malformed and empty burst pairs contribute no edges.
pub fn extract<S: ContactSource>(records: &[S]) -> Extraction<S::Time> {
    let mut edges = Vec::new();
    let mut well_formed = Vec::with_capacity(records.len());

    for record in records {
        let decoded = burst::decode_contacts(record.prox_id_burst(), record.prox_rssi_burst());
        well_formed.push(decoded.is_well_formed());

        if let ContactBurst::Contacts(contacts) = decoded {
            let time = record.time();
            let gps = record.has_gps();
            edges.extend(contacts.into_iter().map(|(send_id, rssi)| ProximityEdge {
                row: record.row(),
                time: time.clone(),
                recv_id: record.receiver().to_string(),
                send_id,
                rssi,
                filename: record.filename().to_string(),
                csv_index: record.csv_index(),
                gps,
                location_category: None,
            }));
        }
    }

    Extraction { edges, well_formed }
}

/// Explode without reporting malformed records.
pub fn extract_edges<S: ContactSource>(records: &[S]) -> Vec<ProximityEdge<S::Time>> {
    extract(records).edges
}
