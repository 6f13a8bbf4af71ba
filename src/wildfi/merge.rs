//! Folding separate GPS records into proximity records of the same tag.
//!
//! Matching is one-to-one. All (GPS, proximity) pairs of a tag within the
//! allowed gap are ranked by absolute time difference, then by the configured
//! tie-break, then by row; pairs are accepted greedily while both sides are
//! still free. Any GPS record left over is kept as a standalone observation.
//! GPS records that saw contacts of their own are never folded, so their
//! edges survive the merge.
//! No leftover GPS record is within the gap of a leftover proximity record,
//! so merging an already merged table changes nothing.

use std::collections::{BTreeMap, HashSet};

use super::models::{GpsFix, Observation, ObservationKind};
use crate::config::MergeTieBreak;

struct Candidate {
    gps: usize,
    prox: usize,
    /// GPS time minus proximity time.
    diff: i64,
}

impl Candidate {
    fn sort_key(&self, tie_break: MergeTieBreak, rows: (usize, usize)) -> (i64, u8, usize, usize) {
        let preferred = match tie_break {
            MergeTieBreak::Earlier => self.diff <= 0,
            MergeTieBreak::Later => self.diff >= 0,
        };
        (self.diff.abs(), u8::from(!preferred), rows.0, rows.1)
    }
}

/// Merge GPS records into the nearest free proximity record within `max_gap_seconds`.
///
/// The output keeps input order; merged GPS records are removed and their fix
/// is carried by the proximity record they were folded into.
pub fn merge_gps_points(
    observations: Vec<Observation>,
    max_gap_seconds: i64,
    tie_break: MergeTieBreak,
) -> Vec<Observation> {
    // Per tag: contact-free GPS records sorted by time, and proximity records without a fix
    let mut by_tag: BTreeMap<&str, (Vec<usize>, Vec<usize>)> = BTreeMap::new();
    for (i, obs) in observations.iter().enumerate() {
        let entry = by_tag.entry(obs.tag_id.as_str()).or_default();
        match obs.kind {
            ObservationKind::Gps { .. } if !obs.has_contacts() => entry.0.push(i),
            ObservationKind::Proximity { .. } => entry.1.push(i),
            ObservationKind::Gps { .. } | ObservationKind::Combined { .. } => {}
        }
    }

    let mut candidates: Vec<Candidate> = Vec::new();
    for (gps, prox) in by_tag.values_mut() {
        if gps.is_empty() || prox.is_empty() {
            continue;
        }
        gps.sort_by_key(|&i| observations[i].utc_timestamp);

        for &p in prox.iter() {
            let t = observations[p].utc_timestamp;
            let lo = gps.partition_point(|&g| observations[g].utc_timestamp < t - max_gap_seconds);
            let hi = gps.partition_point(|&g| observations[g].utc_timestamp <= t + max_gap_seconds);
            candidates.extend(gps[lo..hi].iter().map(|&g| Candidate {
                gps: g,
                prox: p,
                diff: observations[g].utc_timestamp - t,
            }));
        }
    }

    candidates.sort_by_key(|c| {
        c.sort_key(tie_break, (observations[c.prox].row, observations[c.gps].row))
    });

    let mut used_gps: HashSet<usize> = HashSet::new();
    let mut partner: Vec<Option<(usize, i64)>> = vec![None; observations.len()];
    for c in candidates {
        if partner[c.prox].is_some() || used_gps.contains(&c.gps) {
            continue;
        }
        used_gps.insert(c.gps);
        partner[c.prox] = Some((c.gps, c.diff));
    }

    let merged = used_gps.len();
    let fixes: Vec<Option<(usize, GpsFix)>> = observations
        .iter()
        .map(|o| o.gps_fix().map(|f| (o.row, *f)))
        .collect();

    let out: Vec<Observation> = observations
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !used_gps.contains(i))
        .map(|(i, mut obs)| {
            if let Some((g, diff)) = partner[i]
                && let Some((gps_row, fix)) = fixes[g]
                && let ObservationKind::Proximity { sensors } = obs.kind
            {
                obs.kind = ObservationKind::Combined {
                    sensors,
                    fix,
                    gps_row: Some(gps_row),
                    gps_time_diff: diff,
                };
            }
            obs
        })
        .collect();

    tracing::info!(
        merged,
        standalone_gps = out
            .iter()
            .filter(|o| matches!(o.kind, ObservationKind::Gps { .. }))
            .count(),
        "Merged GPS points"
    );
    out
}
