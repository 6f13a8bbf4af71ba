//! Whitespace-delimited burst fields.
//!
//! WildFi tags pack several samples into a single table cell: acceleration
//! bursts hold `x y z` triples, proximity bursts hold parallel lists of
//! sender ids and RSSI values. Decoding never panics; malformed input is
//! returned as a [`BurstError`] or [`ContactBurst::Malformed`] so the quality
//! checker can record it.

use std::fmt::Display;

/// Values per acceleration sample (x, y, z).
pub const ACC_AXES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BurstError {
    #[error("{count} tokens is not a multiple of 3")]
    IncompleteSample { count: usize },

    #[error("token {token:?} is not a finite number")]
    InvalidNumber { token: String },
}

/// Split a burst cell into its tokens. `None` and blank cells yield nothing.
pub fn tokens(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default().split_whitespace()
}

/// Number of tokens in a burst cell.
pub fn token_count(raw: Option<&str>) -> usize {
    tokens(raw).count()
}

/// Decode a numeric burst into `x y z` triples.
///
/// # Errors
///
/// `IncompleteSample` when the token count is not a multiple of three,
/// `InvalidNumber` when a token is not a finite float (`nan` and `inf` are
/// rejected).
pub fn decode_numeric_burst(raw: Option<&str>) -> Result<Vec<[f64; ACC_AXES]>, BurstError> {
    let values = tokens(raw)
        .map(|t| {
            t.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| BurstError::InvalidNumber {
                    token: t.to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if values.len() % ACC_AXES != 0 {
        return Err(BurstError::IncompleteSample {
            count: values.len(),
        });
    }

    Ok(values
        .chunks_exact(ACC_AXES)
        .map(|c| [c[0], c[1], c[2]])
        .collect())
}

/// Decode a list burst (sender ids, RSSI values) into its tokens.
pub fn decode_list_burst(raw: Option<&str>) -> Vec<String> {
    tokens(raw).map(str::to_string).collect()
}

/// Encode triples as a single space separated burst.
pub fn encode_numeric_burst(samples: &[[f64; ACC_AXES]]) -> String {
    encode_list_burst(samples.iter().flatten())
}

/// Join tokens with single spaces, preserving order.
pub fn encode_list_burst<I>(values: I) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Result of decoding the parallel proximity bursts of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactBurst {
    /// Both lists are empty.
    Empty,
    /// Token counts differ, or an RSSI token is not an `i16`.
    Malformed,
    /// `(sender id, rssi)` pairs in burst order.
    Contacts(Vec<(String, i16)>),
}

impl ContactBurst {
    pub fn is_well_formed(&self) -> bool {
        !matches!(self, Self::Malformed)
    }

    pub fn into_contacts(self) -> Vec<(String, i16)> {
        match self {
            Self::Contacts(c) => c,
            Self::Empty | Self::Malformed => Vec::new(),
        }
    }
}

/// Decode a sender id burst and its parallel RSSI burst.
pub fn decode_contacts(id_burst: Option<&str>, rssi_burst: Option<&str>) -> ContactBurst {
    let ids = decode_list_burst(id_burst);
    let rssis: Vec<&str> = tokens(rssi_burst).collect();

    if ids.len() != rssis.len() {
        return ContactBurst::Malformed;
    }
    if ids.is_empty() {
        return ContactBurst::Empty;
    }

    let mut contacts = Vec::with_capacity(ids.len());
    for (id, rssi) in ids.into_iter().zip(rssis) {
        let Ok(rssi) = rssi.parse::<i16>() else {
            return ContactBurst::Malformed;
        };
        contacts.push((id, rssi));
    }
    ContactBurst::Contacts(contacts)
}
