//! Dynamic Body Acceleration from acceleration bursts.

use serde::{Deserialize, Serialize};

use super::burst::ACC_AXES;

/// Per-burst activity summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccSummary {
    #[serde(rename = "VeDBAMean")]
    pub ve_dba_mean: f64,
    #[serde(rename = "ODBAMean")]
    pub odba_mean: f64,
}

/// Remove the static component: each sample minus the per-axis burst mean.
pub fn dynamic_acceleration(samples: &[[f64; ACC_AXES]]) -> Vec<[f64; ACC_AXES]> {
    if samples.is_empty() {
        return Vec::new();
    }

    let n = samples.len() as f64;
    let mut mean = [0.0; ACC_AXES];
    for s in samples {
        for (m, v) in mean.iter_mut().zip(s) {
            *m += v / n;
        }
    }

    samples
        .iter()
        .map(|s| [s[0] - mean[0], s[1] - mean[1], s[2] - mean[2]])
        .collect()
}

/// Vectorial DBA: Euclidean norm of each dynamic sample.
pub fn ve_dba(dba: &[[f64; ACC_AXES]]) -> Vec<f64> {
    dba.iter()
        .map(|s| s.iter().map(|v| v * v).sum::<f64>().sqrt())
        .collect()
}

/// Overall DBA: sum of absolute values of each dynamic sample.
pub fn odba(dba: &[[f64; ACC_AXES]]) -> Vec<f64> {
    dba.iter()
        .map(|s| s.iter().map(|v| v.abs()).sum())
        .collect()
}

/// Mean VeDBA and ODBA of a burst. `None` for an empty burst.
pub fn summarize(samples: &[[f64; ACC_AXES]]) -> Option<AccSummary> {
    if samples.is_empty() {
        return None;
    }

    let dba = dynamic_acceleration(samples);
    Some(AccSummary {
        ve_dba_mean: mean(&ve_dba(&dba)),
        odba_mean: mean(&odba(&dba)),
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
