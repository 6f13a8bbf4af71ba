//! Tests for location classification.
//!
//! Run with: cargo test --test classifier_test

mod common;

use common::{T0, gps_raw, observation, prox_raw};
use wildfi_pipeline::config::LocationSettings;
use wildfi_pipeline::wildfi::classifier::classify_location;
use wildfi_pipeline::wildfi::proximity;
use wildfi_pipeline::wildfi::{LocationOrder, TagMetadata};

fn gateway(tag_id: &str, label: &str) -> TagMetadata {
    TagMetadata {
        tag_id: tag_id.to_string(),
        location_category: Some(label.to_string()),
        location_x: None,
        location_y: None,
        tag_type: Some("Gateway".to_string()),
        location: None,
        total_rows: 0,
        prox_and_gps_rows: 0,
        only_prox_rows: 0,
    }
}

fn order() -> LocationOrder {
    LocationOrder::from_tags(
        &LocationSettings::default(),
        &[gateway("G1", "InCave"), gateway("G2", "Outside")],
    )
}

fn with_fix(row: usize, ids: &str, rssis: &str) -> wildfi_pipeline::wildfi::Observation {
    let mut raw = prox_raw(row, "A1", T0 + row as i64, ids, rssis);
    let fix = gps_raw(row, "A1", T0);
    raw.lat = fix.lat;
    raw.lon = fix.lon;
    raw.hdop = fix.hdop;
    raw.ttf_seconds = fix.ttf_seconds;
    observation(&raw)
}

#[test]
fn order_keeps_configured_precedence_and_sentinels() {
    let order = order();
    assert_eq!(order.labels(), ["InCave", "Outside", "Unknown"]);
    assert_eq!(order.gateway_rank("G1"), Some(0));
    assert_eq!(order.gateway_rank("A1"), None);
    assert_eq!(order.label(order.gps_rank()), "Outside");
    assert_eq!(order.label(order.none_rank()), "Unknown");
}

#[test]
fn unlisted_gateway_labels_follow_configured_ones() {
    let settings = LocationSettings {
        precedence: vec!["InCave".to_string()],
        gps_label: "GPS".to_string(),
        none_label: "None".to_string(),
    };
    let order = LocationOrder::from_tags(
        &settings,
        &[gateway("G1", "Roost"), gateway("G2", "InCave"), gateway("G3", "Roost")],
    );

    assert_eq!(order.labels(), ["InCave", "Roost", "GPS", "None"]);
    assert_eq!(order.gateway_rank("G3"), Some(1));
}

#[test]
fn gateway_contact_beats_gps_fix() {
    let obs = vec![with_fix(0, "G1 B1", "-70 -80")];
    let edges = proximity::extract_edges(&obs);

    let result = classify_location(&obs, &edges, &order());
    assert_eq!(result.observations, vec!["InCave".to_string()]);
    assert_eq!(result.edges, vec!["InCave".to_string(), "InCave".to_string()]);
}

#[test]
fn gps_fix_beats_unknown_senders() {
    let obs = vec![with_fix(0, "B1", "-70")];
    let edges = proximity::extract_edges(&obs);

    let result = classify_location(&obs, &edges, &order());
    assert_eq!(result.observations, vec!["Outside".to_string()]);
    assert_eq!(result.edges, vec!["Outside".to_string()]);
}

#[test]
fn resolved_location_is_broadcast_to_every_edge() {
    let obs = vec![
        observation(&prox_raw(0, "A1", T0, "B1 G2 B2", "-70 -75 -60")),
        observation(&prox_raw(1, "A1", T0 + 60, "B1", "-70")),
    ];
    let edges = proximity::extract_edges(&obs);

    let result = classify_location(&obs, &edges, &order());
    assert_eq!(result.observations, vec!["Outside", "Unknown"]);
    assert_eq!(result.edges, vec!["Outside", "Outside", "Outside", "Unknown"]);
}

#[test]
fn observation_without_candidates_gets_none_label() {
    let obs = vec![observation(&prox_raw(0, "A1", T0, "", ""))];
    let edges = proximity::extract_edges(&obs);
    assert!(edges.is_empty());

    let result = classify_location(&obs, &edges, &order());
    assert_eq!(result.observations, vec!["Unknown"]);
    assert!(result.edges.is_empty());
}

#[test]
fn precedence_decides_between_gateways() {
    let obs = vec![observation(&prox_raw(0, "A1", T0, "G2 G1", "-60 -90"))];
    let edges = proximity::extract_edges(&obs);

    let result = classify_location(&obs, &edges, &order());
    assert_eq!(result.observations, vec!["InCave"]);
}
