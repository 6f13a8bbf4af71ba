//! Tests for the data quality checker.
//!
//! Run with: cargo test --test checker_test

mod common;

use std::collections::HashSet;

use common::{T0, gps_raw, prox_raw};
use wildfi_pipeline::wildfi::checker;
use wildfi_pipeline::wildfi::proximity;
use wildfi_pipeline::wildfi::{QualityFlag, RawObservation, RowKind};

fn known(ids: &[&str]) -> HashSet<String> {
    ids.iter().map(|s| (*s).to_string()).collect()
}

fn assert_monotonic(flags: &[QualityFlag]) {
    for flag in flags {
        let expected = flag.duplicate
            || !flag.missing_prox_cols.is_empty()
            || !flag.missing_gps_cols.is_empty()
            || flag.acc_malformed
            || flag.prox_malformed
            || flag.bad_prox_count > 0
            || flag.duplicate_prox_count > 0;
        assert_eq!(flag.any_problems, expected, "row {}", flag.row);
    }
}

#[test]
fn clean_row_has_no_problems() {
    let rows = vec![prox_raw(0, "A1", T0, "B1 B2", "-70 -65")];
    let flags = checker::check_data(&rows, Some(&known(&["A1", "B1", "B2"])), false);

    assert_eq!(flags.len(), 1);
    assert!(!flags[0].any_problems);
    assert_eq!(flags[0].kind, RowKind::Proximity);
    assert_eq!(proximity::extract_edges(&rows).len(), 2);
}

#[test]
fn length_mismatch_marks_prox_malformed() {
    let rows = vec![prox_raw(0, "A1", T0, "B1 B2", "-70")];
    let flags = checker::check_data(&rows, Some(&known(&["A1", "B1", "B2"])), false);

    assert!(flags[0].prox_malformed);
    assert!(flags[0].any_problems);
    assert!(proximity::extract_edges(&rows).is_empty());
}

#[test]
fn unknown_sender_is_reported() {
    let rows = vec![prox_raw(0, "A1", T0, "B1 X9", "-70 -65")];
    let flags = checker::check_data(&rows, Some(&known(&["A1", "B1"])), false);

    assert_eq!(flags[0].bad_prox_ids, vec!["X9".to_string()]);
    assert_eq!(flags[0].bad_prox_count, 1);
    assert!(flags[0].any_problems);
}

#[test]
fn unknown_sender_check_needs_known_ids() {
    let rows = vec![prox_raw(0, "A1", T0, "B1 X9", "-70 -65")];

    let flags = checker::check_data(&rows, None, false);
    assert_eq!(flags[0].bad_prox_count, 0);

    let flags = checker::check_data(&rows, Some(&HashSet::new()), false);
    assert_eq!(flags[0].bad_prox_count, 0);
    assert!(!flags[0].any_problems);
}

#[test]
fn duplicate_rows_flag_all_but_mark_first() {
    let rows = vec![
        prox_raw(0, "A1", T0, "", ""),
        prox_raw(1, "A1", T0, "", ""),
        prox_raw(2, "A1", T0 + 60, "", ""),
    ];
    let flags = checker::check_data(&rows, None, false);

    assert!(flags[0].duplicate);
    assert!(flags[1].duplicate);
    assert!(!flags[2].duplicate);
    assert!(!flags[0].duplicate_except_first);
    assert!(flags[1].duplicate_except_first);
}

#[test]
fn same_timestamp_on_different_tags_is_not_duplicate() {
    let rows = vec![prox_raw(0, "A1", T0, "", ""), prox_raw(1, "A2", T0, "", "")];
    let flags = checker::check_data(&rows, None, false);
    assert!(flags.iter().all(|f| !f.duplicate));
}

#[test]
fn repeated_sender_in_one_burst() {
    let rows = vec![prox_raw(0, "A1", T0, "B2 B1 B2 B1 C3", "-70 -65 -71 -66 -80")];
    let flags = checker::check_data(&rows, Some(&known(&["A1", "B1", "B2", "C3"])), false);

    assert_eq!(flags[0].duplicate_prox_count, 4);
    assert_eq!(
        flags[0].duplicate_prox_ids,
        vec!["B1".to_string(), "B2".to_string()]
    );
    assert!(flags[0].any_problems);
}

#[test]
fn missing_fields_are_judged_by_row_kind() {
    let mut prox = prox_raw(0, "A1", T0, "", "");
    prox.humidity_in_percent = None;
    let mut gps = gps_raw(1, "A1", T0 + 10);
    gps.hdop = None;

    let flags = checker::check_data(&[prox, gps], None, false);

    assert_eq!(flags[0].kind, RowKind::Proximity);
    assert_eq!(flags[0].missing_prox_cols, vec!["humidityInPercent".to_string()]);
    assert!(flags[0].missing_gps_cols.is_empty());

    assert_eq!(flags[1].kind, RowKind::Gps);
    assert_eq!(flags[1].missing_gps_cols, vec!["hdop".to_string()]);
    assert!(flags[1].missing_prox_cols.is_empty());
}

#[test]
fn row_kind_follows_the_more_complete_group() {
    assert_eq!(checker::classify_row(&prox_raw(0, "A1", T0, "", "")), RowKind::Proximity);
    assert_eq!(checker::classify_row(&gps_raw(0, "A1", T0)), RowKind::Gps);

    // Ties go to GPS, including a record with every field
    let mut both = prox_raw(0, "A1", T0, "", "");
    let fix = gps_raw(0, "A1", T0);
    both.lat = fix.lat;
    both.lon = fix.lon;
    both.hdop = fix.hdop;
    both.ttf_seconds = fix.ttf_seconds;
    assert_eq!(checker::classify_row(&both), RowKind::Gps);
    assert_eq!(both.gps_fix(), fix.gps_fix());
    assert!(checker::check_data(&[both], None, false)[0].missing_gps_cols.is_empty());

    assert_eq!(checker::classify_row(&RawObservation::default()), RowKind::Gps);
}

#[test]
fn gps_fix_needs_all_four_fields() {
    let fix = gps_raw(0, "A1", T0).gps_fix().unwrap();
    assert_eq!((fix.lat, fix.hdop), (42.66, 1.2));

    let mut partial = gps_raw(0, "A1", T0);
    partial.ttf_seconds = None;
    assert_eq!(partial.gps_fix(), None);
    assert_eq!(prox_raw(0, "A1", T0, "", "").gps_fix(), None);
}

#[test]
fn unrepresentable_timestamp_counts_as_missing() {
    let prox = prox_raw(0, "A1", i64::MAX, "", "");
    let gps = gps_raw(1, "A1", i64::MIN);

    let flags = checker::check_data(&[prox, gps], None, false);
    assert_eq!(flags[0].missing_prox_cols, vec!["utcTimestamp".to_string()]);
    assert_eq!(flags[1].missing_gps_cols, vec!["utcTimestamp".to_string()]);
    assert!(flags.iter().all(|f| f.any_problems));
}

#[test]
fn malformed_acceleration_is_flagged() {
    let mut incomplete = prox_raw(0, "A1", T0, "", "");
    incomplete.acc_in_g_burst = Some("0.1 0.2".to_string());
    let mut garbage = prox_raw(1, "A1", T0 + 1, "", "");
    garbage.acc_in_g_burst = Some("0.1 0.2 high".to_string());

    let flags = checker::check_data(&[incomplete, garbage], None, false);
    assert!(flags.iter().all(|f| f.acc_malformed && f.any_problems));
}

#[test]
fn non_finite_acceleration_is_flagged() {
    let mut nan = prox_raw(0, "A1", T0, "", "");
    nan.acc_in_g_burst = Some("nan 0 0".to_string());
    let mut inf = prox_raw(1, "A1", T0 + 1, "", "");
    inf.acc_in_g_burst = Some("0.1 0.2 0.3 inf 1 2".to_string());

    let flags = checker::check_data(&[nan, inf], None, true);
    assert_eq!(flags.len(), 2);
    assert!(flags.iter().all(|f| f.acc_malformed));
}

#[test]
fn only_bad_rows_can_be_returned() {
    let rows = vec![
        prox_raw(0, "A1", T0, "B1", "-70"),
        prox_raw(1, "A1", T0 + 60, "B1 B2", "-70"),
        prox_raw(2, "A1", T0 + 120, "X9", "-50"),
    ];
    let flags = checker::check_data(&rows, Some(&known(&["A1", "B1", "B2"])), true);

    let rows: Vec<usize> = flags.iter().map(|f| f.row).collect();
    assert_eq!(rows, vec![1, 2]);
}

#[test]
fn any_problems_is_the_or_of_all_conditions() {
    let mut missing = gps_raw(5, "A2", T0);
    missing.lon = None;
    let mut bad_acc = prox_raw(6, "A2", T0 + 5, "", "");
    bad_acc.acc_in_g_burst = Some("1".to_string());

    let rows = vec![
        prox_raw(0, "A1", T0, "B1 B2", "-70 -65"),
        prox_raw(1, "A1", T0, "B1", "-70"),
        prox_raw(2, "A1", T0 + 60, "B1 B2", "-70"),
        prox_raw(3, "A1", T0 + 120, "X9 B1", "-50 -60"),
        prox_raw(4, "A1", T0 + 180, "B1 B1", "-50 -60"),
        missing,
        bad_acc,
        gps_raw(7, "A2", T0 + 30),
    ];
    let flags = checker::check_data(&rows, Some(&known(&["A1", "A2", "B1", "B2"])), false);

    assert_eq!(flags.len(), rows.len());
    assert_monotonic(&flags);
    assert_eq!(flags.iter().filter(|f| f.any_problems).count(), 7);
}

#[test]
fn rechecking_cleaned_rows_finds_nothing() {
    let rows = vec![
        prox_raw(0, "A1", T0, "B1 B2", "-70 -65"),
        prox_raw(1, "A1", T0, "B1", "-70"),
        prox_raw(2, "A1", T0 + 60, "B1 B2", "-70"),
        prox_raw(3, "A1", T0 + 120, "B1 B1", "-70 -71"),
        prox_raw(4, "A1", T0 + 180, "B2", "-60"),
        gps_raw(5, "A1", T0 + 200),
    ];
    let ids = known(&["A1", "B1", "B2"]);
    let flags = checker::check_data(&rows, Some(&ids), false);

    let cleaned: Vec<RawObservation> = rows
        .into_iter()
        .zip(&flags)
        .filter(|(_, f)| !f.any_problems)
        .map(|(r, _)| r)
        .collect();
    assert_eq!(cleaned.len(), 2);

    let again = checker::check_data(&cleaned, Some(&ids), true);
    assert!(again.is_empty());
}
