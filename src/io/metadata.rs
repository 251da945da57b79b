use crate::types::{SatError, SatResult};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::{Path, PathBuf};

/// Filename prefix of the product metadata descriptor inside a tile directory
pub const METADATA_PREFIX: &str = "MTD_";
/// Filename suffix of the product metadata descriptor
pub const METADATA_SUFFIX: &str = ".xml";

/// Reflectance divisor used when the descriptor does not state one
pub const DEFAULT_QUANTIFICATION_VALUE: f32 = 10000.0;

/// Find the product metadata descriptor among a tile directory's immediate
/// entries. Zero matches fail; multiple matches resolve to the
/// lexicographically smallest name so the choice is stable across
/// filesystems.
pub fn locate_metadata(tile_dir: &Path) -> SatResult<PathBuf> {
    let entries = std::fs::read_dir(tile_dir)?;

    let mut matches: Vec<String> = entries
        .flatten()
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(METADATA_PREFIX) && name.ends_with(METADATA_SUFFIX))
        .collect();

    if matches.is_empty() {
        return Err(SatError::MetadataNotFound(tile_dir.to_path_buf()));
    }

    matches.sort_unstable();
    if matches.len() > 1 {
        log::warn!(
            "{} metadata descriptors in {}, using {}",
            matches.len(),
            tile_dir.display(),
            matches[0]
        );
    }

    Ok(tile_dir.join(&matches[0]))
}

/// Product-level fields read from the metadata descriptor XML.
///
/// Tag names in the descriptor carry namespace prefixes, so matching is on
/// local names only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductInfo {
    /// Divisor converting digital numbers to unit reflectance
    pub quantification_value: Option<f32>,
    pub product_start_time: Option<String>,
    pub processing_level: Option<String>,
}

impl ProductInfo {
    pub fn parse(xml: &str) -> SatResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut info = ProductInfo::default();
        let mut current: Option<Field> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => {
                    current = match start.name().local_name().as_ref() {
                        b"QUANTIFICATION_VALUE" => Some(Field::Quantification),
                        b"PRODUCT_START_TIME" => Some(Field::StartTime),
                        b"PROCESSING_LEVEL" => Some(Field::ProcessingLevel),
                        _ => None,
                    };
                }
                Ok(Event::Text(text)) => {
                    if let Some(field) = current {
                        let value = text
                            .unescape()
                            .map_err(|e| SatError::XmlParsing(e.to_string()))?
                            .into_owned();
                        match field {
                            Field::Quantification => {
                                info.quantification_value = value.trim().parse::<f32>().ok();
                            }
                            Field::StartTime => info.product_start_time = Some(value),
                            Field::ProcessingLevel => info.processing_level = Some(value),
                        }
                    }
                }
                Ok(Event::End(_)) => current = None,
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(SatError::XmlParsing(format!(
                        "descriptor parse failed at byte {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                Ok(_) => {}
            }
        }

        Ok(info)
    }

    /// Load and parse the descriptor file at `path`
    pub fn from_file(path: &Path) -> SatResult<Self> {
        let xml = std::fs::read_to_string(path)?;
        Self::parse(&xml)
    }

    /// The reflectance divisor, falling back to the product-family default
    pub fn quantification_or_default(&self) -> f32 {
        self.quantification_value
            .unwrap_or(DEFAULT_QUANTIFICATION_VALUE)
    }
}

#[derive(Clone, Copy)]
enum Field {
    Quantification,
    StartTime,
    ProcessingLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<n1:Level-1C_User_Product xmlns:n1="https://psd-14.sentinel2.eo.esa.int/PSD/User_Product_Level-1C.xsd">
  <n1:General_Info>
    <Product_Info>
      <PRODUCT_START_TIME>2021-01-03T11:06:31.024Z</PRODUCT_START_TIME>
      <PROCESSING_LEVEL>Level-1C</PROCESSING_LEVEL>
    </Product_Info>
    <Product_Image_Characteristics>
      <QUANTIFICATION_VALUE unit="none">10000</QUANTIFICATION_VALUE>
    </Product_Image_Characteristics>
  </n1:General_Info>
</n1:Level-1C_User_Product>"#;

    #[test]
    fn parses_product_fields() {
        let info = ProductInfo::parse(SAMPLE).unwrap();
        assert_eq!(info.quantification_value, Some(10000.0));
        assert_eq!(
            info.product_start_time.as_deref(),
            Some("2021-01-03T11:06:31.024Z")
        );
        assert_eq!(info.processing_level.as_deref(), Some("Level-1C"));
    }

    #[test]
    fn missing_fields_fall_back() {
        let info = ProductInfo::parse("<root><other>1</other></root>").unwrap();
        assert_eq!(info.quantification_value, None);
        assert_eq!(info.quantification_or_default(), DEFAULT_QUANTIFICATION_VALUE);
    }

    #[test]
    fn locate_picks_lexicographic_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("MTD_MSIL1C.xml"), "<x/>").unwrap();
        std::fs::write(dir.path().join("MTD_AUX.xml"), "<x/>").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let found = locate_metadata(dir.path()).unwrap();
        assert_eq!(found.file_name().unwrap(), "MTD_AUX.xml");
    }

    #[test]
    fn locate_fails_on_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = locate_metadata(dir.path()).unwrap_err();
        assert!(matches!(err, SatError::MetadataNotFound(_)));
    }
}
