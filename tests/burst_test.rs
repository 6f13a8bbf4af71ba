//! Tests for burst decoding and the acceleration summary.
//!
//! Run with: cargo test --test burst_test

use wildfi_pipeline::wildfi::burst::{self, BurstError, ContactBurst};
use wildfi_pipeline::wildfi::dba;

#[test]
fn numeric_burst_decodes_into_triples() {
    let samples = burst::decode_numeric_burst(Some("0.1 0.2 0.3 1 2 3")).unwrap();
    assert_eq!(samples, vec![[0.1, 0.2, 0.3], [1.0, 2.0, 3.0]]);

    // Extra whitespace is ignored
    let samples = burst::decode_numeric_burst(Some("  1  2\t3 ")).unwrap();
    assert_eq!(samples, vec![[1.0, 2.0, 3.0]]);
}

#[test]
fn empty_numeric_burst_is_valid() {
    assert!(burst::decode_numeric_burst(None).unwrap().is_empty());
    assert!(burst::decode_numeric_burst(Some("")).unwrap().is_empty());
}

#[test]
fn numeric_burst_reports_malformed_input() {
    assert_eq!(
        burst::decode_numeric_burst(Some("1 2 3 4")),
        Err(BurstError::IncompleteSample { count: 4 })
    );
    assert_eq!(
        burst::decode_numeric_burst(Some("1 x 3")),
        Err(BurstError::InvalidNumber {
            token: "x".to_string()
        })
    );
}

#[test]
fn non_finite_tokens_are_invalid_numbers() {
    for (raw, token) in [("nan 0 0", "nan"), ("0 1 2 inf 1 2", "inf"), ("1 -Infinity 0", "-Infinity")] {
        assert_eq!(
            burst::decode_numeric_burst(Some(raw)),
            Err(BurstError::InvalidNumber {
                token: token.to_string()
            })
        );
    }
}

#[test]
fn encoding_preserves_token_order() {
    let tokens = vec!["B2".to_string(), "A1".to_string(), "C3".to_string()];
    let encoded = burst::encode_list_burst(&tokens);
    assert_eq!(encoded, "B2 A1 C3");
    assert_eq!(burst::decode_list_burst(Some(&encoded)), tokens);

    let samples = vec![[0.5, -1.0, 2.25], [0.0, 0.0, 1.0]];
    let encoded = burst::encode_numeric_burst(&samples);
    assert_eq!(burst::decode_numeric_burst(Some(&encoded)).unwrap(), samples);
}

#[test]
fn list_burst_of_nothing_is_empty() {
    assert!(burst::decode_list_burst(None).is_empty());
    assert!(burst::decode_list_burst(Some("   ")).is_empty());
    assert_eq!(burst::token_count(Some("a b  c")), 3);
}

#[test]
fn contacts_pair_ids_with_rssi() {
    let decoded = burst::decode_contacts(Some("B1 B2"), Some("-70 -65"));
    assert_eq!(
        decoded,
        ContactBurst::Contacts(vec![("B1".to_string(), -70), ("B2".to_string(), -65)])
    );
    assert!(decoded.is_well_formed());
}

#[test]
fn contacts_detect_malformed_bursts() {
    // Length mismatch
    assert_eq!(
        burst::decode_contacts(Some("B1 B2"), Some("-70")),
        ContactBurst::Malformed
    );
    // RSSI outside i16 or not a number
    assert_eq!(
        burst::decode_contacts(Some("B1"), Some("-40000")),
        ContactBurst::Malformed
    );
    assert_eq!(
        burst::decode_contacts(Some("B1"), Some("loud")),
        ContactBurst::Malformed
    );
    assert!(!ContactBurst::Malformed.is_well_formed());
    assert!(ContactBurst::Malformed.into_contacts().is_empty());
}

#[test]
fn contacts_of_empty_bursts_are_empty() {
    assert_eq!(burst::decode_contacts(None, None), ContactBurst::Empty);
    assert_eq!(burst::decode_contacts(Some(""), None), ContactBurst::Empty);
    assert!(ContactBurst::Empty.is_well_formed());
}

#[test]
fn still_burst_has_no_dynamic_acceleration() {
    let summary = dba::summarize(&[[0.0, 0.0, 1.0], [0.0, 0.0, 1.0]]).unwrap();
    assert!(summary.ve_dba_mean.abs() < 1e-12);
    assert!(summary.odba_mean.abs() < 1e-12);
}

#[test]
fn dba_summary_uses_deviation_from_mean() {
    // Mean is (0, 0, 1), deviations are (+-1, 0, 0)
    let samples = [[1.0, 0.0, 1.0], [-1.0, 0.0, 1.0]];
    let summary = dba::summarize(&samples).unwrap();
    assert!((summary.ve_dba_mean - 1.0).abs() < 1e-12);
    assert!((summary.odba_mean - 1.0).abs() < 1e-12);

    let samples = [[1.0, 1.0, 0.0], [-1.0, -1.0, 0.0]];
    let summary = dba::summarize(&samples).unwrap();
    assert!((summary.ve_dba_mean - 2f64.sqrt()).abs() < 1e-12);
    assert!((summary.odba_mean - 2.0).abs() < 1e-12);

    assert!(dba::summarize(&[]).is_none());
}
