//! Location classification from gateway contacts and GPS fixes.
//!
//! Every observation collects candidate labels: one per proximity edge (the
//! sender's gateway location, or the `none` label for non-gateways) plus the
//! `gps` label when it has a fix. The candidate with the highest precedence
//! wins and is broadcast back onto all of the observation's edges.

use std::collections::HashMap;

use super::models::{Observation, ProximityEdge, TagMetadata};
use crate::config::LocationSettings;

/// Precedence-ordered location labels plus the gateway-to-label mapping.
///
/// The two reserved labels (GPS fix, no location) are always present.
/// Immutable once built.
#[derive(Debug, Clone)]
pub struct LocationOrder {
    labels: Vec<String>,
    gateways: HashMap<String, usize>,
    gps: usize,
    none: usize,
}

impl LocationOrder {
    /// Build the order.
    ///
    /// Labels named in `settings.precedence` come first, in that order. Gateway
    /// labels not named there follow in order of first appearance, then the
    /// GPS and none labels if they are still missing.
    pub fn new<'a, I>(settings: &LocationSettings, gateways: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut labels: Vec<String> = Vec::new();

        for label in &settings.precedence {
            rank_of(&mut labels, label);
        }

        let mut mapping = HashMap::new();
        for (tag_id, label) in gateways {
            let rank = rank_of(&mut labels, label);
            mapping.entry(tag_id.to_string()).or_insert(rank);
        }

        let gps = rank_of(&mut labels, &settings.gps_label);
        let none = rank_of(&mut labels, &settings.none_label);

        Self {
            labels,
            gateways: mapping,
            gps,
            none,
        }
    }

    /// Order built from the gateways (tags with a `locationCategory`) of `tags`.
    pub fn from_tags(settings: &LocationSettings, tags: &[TagMetadata]) -> Self {
        Self::new(
            settings,
            tags.iter().filter_map(|t| {
                t.location_category
                    .as_deref()
                    .map(|label| (t.tag_id.as_str(), label))
            }),
        )
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label(&self, rank: usize) -> &str {
        &self.labels[rank]
    }

    /// Precedence rank of `label`; lower wins.
    pub fn rank(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Rank of the gateway location of `tag_id`, if it is a gateway.
    pub fn gateway_rank(&self, tag_id: &str) -> Option<usize> {
        self.gateways.get(tag_id).copied()
    }

    pub fn gps_rank(&self) -> usize {
        self.gps
    }

    pub fn none_rank(&self) -> usize {
        self.none
    }
}

fn rank_of(labels: &mut Vec<String>, label: &str) -> usize {
    if let Some(pos) = labels.iter().position(|l| l == label) {
        pos
    } else {
        labels.push(label.to_string());
        labels.len() - 1
    }
}

/// One label per observation and one per edge, aligned with the inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub observations: Vec<String>,
    pub edges: Vec<String>,
}

/// Resolve the location of every observation and broadcast it onto its edges.
///
/// Edges are matched to observations through their `row`. An observation
/// without any candidate (no edges, no GPS fix) resolves to the none label.
pub fn classify_location<T>(
    observations: &[Observation],
    edges: &[ProximityEdge<T>],
    order: &LocationOrder,
) -> Classification {
    let mut best: HashMap<usize, usize> = HashMap::with_capacity(observations.len());
    let mut offer = |row: usize, rank: usize| {
        best.entry(row)
            .and_modify(|r| *r = (*r).min(rank))
            .or_insert(rank);
    };

    for edge in edges {
        let rank = order.gateway_rank(&edge.send_id).unwrap_or(order.none_rank());
        offer(edge.row, rank);
    }
    for obs in observations.iter().filter(|o| o.has_gps()) {
        offer(obs.row, order.gps_rank());
    }

    let resolve = |row: usize| -> String {
        let rank = best.get(&row).copied().unwrap_or(order.none_rank());
        order.label(rank).to_string()
    };

    Classification {
        observations: observations.iter().map(|o| resolve(o.row)).collect(),
        edges: edges.iter().map(|e| resolve(e.row)).collect(),
    }
}
