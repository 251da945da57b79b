use chrono::NaiveDate;
use satpipe::types::{AcquisitionIntent, BoundingBox, ProviderSelection, SatError};
use satpipe::QueryBuilder;
use std::path::PathBuf;

fn donana_intent() -> AcquisitionIntent {
    AcquisitionIntent {
        inidate: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
        enddate: NaiveDate::from_ymd_opt(2021, 1, 10).unwrap(),
        region: "Doñana".to_string(),
        bbox: BoundingBox::new(-6.5, 36.8, -6.2, 37.0),
        cloud_cover_max: 30,
        output_path: PathBuf::from("/data/Donana"),
    }
}

#[test]
fn test_provider_descriptor_pair() {
    let pair = QueryBuilder::build(&donana_intent()).expect("Failed to build queries");

    // Sentinel-2 carries both platform and product type
    assert_eq!(pair.sentinel2.producttype, "S2MSI1C");
    assert_eq!(pair.sentinel2.platform.as_deref(), Some("Sentinel-2"));

    // Landsat-8 has a product type but no platform at all
    assert_eq!(pair.landsat8.producttype, "LANDSAT_8_C1");
    assert!(pair.landsat8.platform.is_none());

    // Everything else is shared between the two descriptors
    assert_eq!(pair.sentinel2.coordinates, pair.landsat8.coordinates);
    assert_eq!(pair.sentinel2.cloud, 30);
    assert_eq!(pair.landsat8.cloud, 30);
    assert_eq!(pair.sentinel2.output_path, "/data/Donana");
    assert_eq!(pair.landsat8.output_path, "/data/Donana");
    assert_eq!(pair.sentinel2.region, "Doñana");
}

#[test]
fn test_descriptor_json_shape() {
    let pair = QueryBuilder::build(&donana_intent()).expect("Failed to build queries");

    let s2: serde_json::Value =
        serde_json::from_str(&pair.sentinel2.to_json().unwrap()).unwrap();
    assert_eq!(s2["platform"], "Sentinel-2");
    assert_eq!(s2["producttype"], "S2MSI1C");
    assert_eq!(s2["coordinates"]["W"], -6.5);
    assert_eq!(s2["coordinates"]["N"], 37.0);
    assert_eq!(s2["inidate"], "2021-01-01");
    assert_eq!(s2["enddate"], "2021-01-10");

    let l8: serde_json::Value =
        serde_json::from_str(&pair.landsat8.to_json().unwrap()).unwrap();
    assert!(l8.get("platform").is_none());
    assert_eq!(l8["producttype"], "LANDSAT_8_C1");
}

#[test]
fn test_same_intent_same_bytes() {
    let intent = donana_intent();
    let first = QueryBuilder::build(&intent).unwrap();
    let second = QueryBuilder::build(&intent).unwrap();

    assert_eq!(
        first.sentinel2.to_json().unwrap(),
        second.sentinel2.to_json().unwrap()
    );
    assert_eq!(
        first.landsat8.to_json().unwrap(),
        second.landsat8.to_json().unwrap()
    );
}

#[test]
fn test_inverted_window_is_rejected() {
    let mut intent = donana_intent();
    intent.enddate = NaiveDate::from_ymd_opt(2020, 6, 1).unwrap();

    match QueryBuilder::build(&intent) {
        Err(SatError::InvalidDateRange { start, end }) => {
            assert_eq!(start, intent.inidate);
            assert_eq!(end, intent.enddate);
        }
        other => panic!("Expected InvalidDateRange, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_selection_routes_descriptors() {
    let pair = QueryBuilder::build(&donana_intent()).unwrap();

    let s2_only = pair.select(ProviderSelection::Sentinel2);
    assert_eq!(s2_only.len(), 1);
    assert_eq!(s2_only[0].producttype, "S2MSI1C");

    let both = pair.select(ProviderSelection::Both);
    assert_eq!(both.len(), 2);
    assert_eq!(both[1].producttype, "LANDSAT_8_C1");
}
