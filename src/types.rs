use chrono::NaiveDate;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A single raster band as a 2-D reflectance grid (rows x columns)
pub type BandArray = Array2<f32>;

/// Geographic bounding box in West/South/East/North order
///
/// Serialized field names match the region registry and the download
/// collaborator's descriptor format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(rename = "W")]
    pub west: f64,
    #[serde(rename = "S")]
    pub south: f64,
    #[serde(rename = "E")]
    pub east: f64,
    #[serde(rename = "N")]
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self { west, south, east, north }
    }

    /// Round all components to 3 decimals (the canonical registry precision)
    pub fn round3(&self) -> Self {
        Self {
            west: round3(self.west),
            south: round3(self.south),
            east: round3(self.east),
            north: round3(self.north),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.west.is_finite()
            && self.south.is_finite()
            && self.east.is_finite()
            && self.north.is_finite()
    }

    /// True when W < E and S < N
    pub fn is_normalized(&self) -> bool {
        self.west < self.east && self.south < self.north
    }

    /// Render as the `[W,S,E,N]` region-of-interest string consumed by the
    /// enhancement service. Integral values keep a trailing `.0` so the
    /// service sees a decimal number, not an integer.
    pub fn to_roi_string(&self) -> String {
        format!(
            "[{},{},{},{}]",
            fmt_coord(self.west),
            fmt_coord(self.south),
            fmt_coord(self.east),
            fmt_coord(self.north)
        )
    }

    /// Parse a `[W,S,E,N]` region-of-interest string back into a box
    pub fn from_roi_string(s: &str) -> SatResult<Self> {
        let inner = s
            .trim()
            .strip_prefix('[')
            .and_then(|r| r.strip_suffix(']'))
            .ok_or_else(|| SatError::InvalidRegion(format!("not a [W,S,E,N] string: {}", s)))?;

        let parts: Vec<&str> = inner.split(',').collect();
        if parts.len() != 4 {
            return Err(SatError::InvalidRegion(format!(
                "expected 4 components in {}, found {}",
                s,
                parts.len()
            )));
        }

        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part.trim().parse::<f64>().map_err(|e| {
                SatError::InvalidRegion(format!("bad coordinate '{}': {}", part, e))
            })?;
        }

        Ok(Self::new(values[0], values[1], values[2], values[3]))
    }
}

pub(crate) fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Natural decimal rendering: `-6.5` stays `-6.5`, `37` becomes `37.0`
fn fmt_coord(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

/// Satellite platforms handled by the acquisition pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Sentinel2,
    Landsat8,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Sentinel2 => write!(f, "Sentinel-2"),
            Platform::Landsat8 => write!(f, "Landsat-8"),
        }
    }
}

/// Which provider(s) a user action dispatches to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSelection {
    Sentinel2,
    Landsat8,
    Both,
}

/// A user acquisition request before provider-specific expansion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionIntent {
    pub inidate: NaiveDate,
    pub enddate: NaiveDate,
    pub region: String,
    pub bbox: BoundingBox,
    /// Maximum acceptable cloud cover, percent
    pub cloud_cover_max: u8,
    pub output_path: PathBuf,
}

/// Provider-specific query descriptor handed to the download collaborator
///
/// Field order matches the descriptor format the collaborator expects.
/// Landsat-8 descriptors carry no `platform` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderQuery {
    pub inidate: String,
    pub enddate: String,
    pub region: String,
    pub coordinates: BoundingBox,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    pub producttype: String,
    pub cloud: u8,
    pub output_path: String,
}

impl ProviderQuery {
    /// JSON rendering of the descriptor, as consumed by the collaborator
    pub fn to_json(&self) -> SatResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Native resolutions of the Sentinel-2 product family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    R10m,
    R20m,
    R60m,
}

impl Resolution {
    pub const ALL: [Resolution; 3] = [Resolution::R10m, Resolution::R20m, Resolution::R60m];

    pub fn meters(self) -> u32 {
        match self {
            Resolution::R10m => 10,
            Resolution::R20m => 20,
            Resolution::R60m => 60,
        }
    }

    /// Band identifiers at this resolution, in sub-dataset band order.
    /// This partition is fixed for the product family and is never inferred
    /// from data at runtime.
    pub fn band_names(self) -> &'static [&'static str] {
        match self {
            Resolution::R10m => &["B4", "B3", "B2", "B8"],
            Resolution::R20m => &["B5", "B6", "B7", "B8A", "B11", "B12"],
            Resolution::R60m => &["B1", "B9", "B10"],
        }
    }

    /// The substring that identifies this resolution in a sub-dataset
    /// description, e.g. "10m resolution"
    pub fn label(self) -> String {
        format!("{}m resolution", self.meters())
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}m", self.meters())
    }
}

/// Named bands with their pixel grids and native resolutions
#[derive(Debug, Clone, Default)]
pub struct BandSet {
    bands: HashMap<String, BandArray>,
    resolutions: HashMap<String, u32>,
}

impl BandSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a band, replacing any previous entry under the same name
    pub fn insert(&mut self, name: impl Into<String>, resolution: Option<u32>, data: BandArray) {
        let name = name.into();
        if let Some(meters) = resolution {
            self.resolutions.insert(name.clone(), meters);
        }
        self.bands.insert(name, data);
    }

    pub fn get(&self, name: &str) -> Option<&BandArray> {
        self.bands.get(name)
    }

    /// Native resolution in meters, when known
    pub fn resolution_of(&self, name: &str) -> Option<u32> {
        self.resolutions.get(name).copied()
    }

    /// Band names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.bands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Names of all bands at the given native resolution
    pub fn bands_at(&self, meters: u32) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .resolutions
            .iter()
            .filter(|(_, m)| **m == meters)
            .map(|(n, _)| n.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BandArray)> {
        self.bands.iter().map(|(n, a)| (n.as_str(), a))
    }
}

/// Cooperative cancellation flag checked between discrete pipeline steps
/// (per file in a batch, per resolution group in a tile read)
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn checkpoint(&self) -> SatResult<()> {
        if self.is_cancelled() {
            Err(SatError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Error types for the acquisition and band-assembly pipeline
#[derive(Debug, thiserror::Error)]
pub enum SatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid date range: end date {end} precedes start date {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Enhancement service rejected the request (HTTP {status}): {body}")]
    EnhancementService { status: u16, body: String },

    #[error("Enhancement service unreachable: {0}")]
    EnhancementUnavailable(String),

    #[error("Failed to open raster {path}: {message}")]
    RasterOpen { path: PathBuf, message: String },

    #[error("No metadata descriptor found in {0}")]
    MetadataNotFound(PathBuf),

    #[error("Failed to read archive {path}: {message}")]
    ArchiveRead { path: PathBuf, message: String },

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type for pipeline operations
pub type SatResult<T> = Result<T, SatError>;
