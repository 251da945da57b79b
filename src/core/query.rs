use crate::types::{
    AcquisitionIntent, Platform, ProviderQuery, ProviderSelection, SatError, SatResult,
};

/// Catalog product type requested for Sentinel-2 acquisitions
pub const SENTINEL2_PRODUCT_TYPE: &str = "S2MSI1C";
/// Catalog product type requested for Landsat-8 acquisitions
pub const LANDSAT8_PRODUCT_TYPE: &str = "LANDSAT_8_C1";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Builds provider-specific query descriptors from a common acquisition intent
pub struct QueryBuilder;

/// The two descriptors produced for one intent, one per provider
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPair {
    pub sentinel2: ProviderQuery,
    pub landsat8: ProviderQuery,
}

impl QueryPair {
    /// Descriptors to dispatch for a provider selection
    pub fn select(&self, selection: ProviderSelection) -> Vec<&ProviderQuery> {
        match selection {
            ProviderSelection::Sentinel2 => vec![&self.sentinel2],
            ProviderSelection::Landsat8 => vec![&self.landsat8],
            ProviderSelection::Both => vec![&self.sentinel2, &self.landsat8],
        }
    }
}

impl QueryBuilder {
    /// Expand an intent into the Sentinel-2 and Landsat-8 descriptors.
    ///
    /// Deterministic and free of I/O. The date window is validated here,
    /// before any request leaves the process.
    pub fn build(intent: &AcquisitionIntent) -> SatResult<QueryPair> {
        if intent.enddate < intent.inidate {
            return Err(SatError::InvalidDateRange {
                start: intent.inidate,
                end: intent.enddate,
            });
        }

        let base = ProviderQuery {
            inidate: intent.inidate.format(DATE_FORMAT).to_string(),
            enddate: intent.enddate.format(DATE_FORMAT).to_string(),
            region: intent.region.clone(),
            coordinates: intent.bbox,
            platform: None,
            producttype: String::new(),
            cloud: intent.cloud_cover_max,
            output_path: intent.output_path.to_string_lossy().into_owned(),
        };

        let sentinel2 = ProviderQuery {
            platform: Some(Platform::Sentinel2.to_string()),
            producttype: SENTINEL2_PRODUCT_TYPE.to_string(),
            ..base.clone()
        };

        // Landsat-8 descriptors carry no platform key at all
        let landsat8 = ProviderQuery {
            platform: None,
            producttype: LANDSAT8_PRODUCT_TYPE.to_string(),
            ..base
        };

        Ok(QueryPair { sentinel2, landsat8 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn intent() -> AcquisitionIntent {
        AcquisitionIntent {
            inidate: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            enddate: NaiveDate::from_ymd_opt(2021, 1, 10).unwrap(),
            region: "Donana".to_string(),
            bbox: BoundingBox::new(-6.5, 36.8, -6.2, 37.0),
            cloud_cover_max: 30,
            output_path: PathBuf::from("/data/Donana"),
        }
    }

    #[test]
    fn builds_both_descriptors() {
        let pair = QueryBuilder::build(&intent()).unwrap();

        assert_eq!(pair.sentinel2.platform.as_deref(), Some("Sentinel-2"));
        assert_eq!(pair.sentinel2.producttype, "S2MSI1C");
        assert_eq!(pair.landsat8.platform, None);
        assert_eq!(pair.landsat8.producttype, "LANDSAT_8_C1");

        assert_eq!(pair.sentinel2.coordinates, pair.landsat8.coordinates);
        assert_eq!(pair.sentinel2.cloud, pair.landsat8.cloud);
        assert_eq!(pair.sentinel2.output_path, pair.landsat8.output_path);
        assert_eq!(pair.sentinel2.inidate, "2021-01-01");
        assert_eq!(pair.sentinel2.enddate, "2021-01-10");
    }

    #[test]
    fn build_is_deterministic() {
        let intent = intent();
        let a = QueryBuilder::build(&intent).unwrap();
        let b = QueryBuilder::build(&intent).unwrap();
        assert_eq!(a.sentinel2, b.sentinel2);
        assert_eq!(a.landsat8, b.landsat8);
        assert_eq!(
            a.sentinel2.to_json().unwrap(),
            b.sentinel2.to_json().unwrap()
        );
    }

    #[test]
    fn rejects_inverted_date_window() {
        let mut bad = intent();
        bad.enddate = NaiveDate::from_ymd_opt(2020, 12, 31).unwrap();
        let err = QueryBuilder::build(&bad).unwrap_err();
        assert!(matches!(err, SatError::InvalidDateRange { .. }));
    }

    #[test]
    fn landsat_json_has_no_platform_key() {
        let pair = QueryBuilder::build(&intent()).unwrap();
        let l8 = pair.landsat8.to_json().unwrap();
        assert!(!l8.contains("platform"));
        let s2 = pair.sentinel2.to_json().unwrap();
        assert!(s2.contains("\"platform\":\"Sentinel-2\""));
    }

    #[test]
    fn selection_dispatch() {
        let pair = QueryBuilder::build(&intent()).unwrap();
        assert_eq!(pair.select(ProviderSelection::Sentinel2).len(), 1);
        assert_eq!(pair.select(ProviderSelection::Landsat8).len(), 1);
        assert_eq!(pair.select(ProviderSelection::Both).len(), 2);
    }
}
