use crate::io::metadata::{self, ProductInfo};
use crate::types::{BandSet, CancelToken, Resolution, SatError, SatResult};
use gdal::{Dataset, Metadata};
use ndarray::Array2;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use zip::ZipArchive;

/// Suffix appended to an archive's stem to form its tile directory name
pub const PRODUCT_DIR_SUFFIX: &str = ".SAFE";

/// Marker written into the tile directory after a complete extraction.
/// A directory without it is re-extracted rather than trusted.
const EXTRACTION_MARKER: &str = ".extraction-complete";

// One lock per archive path, process-wide, so two readers never race an
// extraction against a band read of the same tile directory.
fn extraction_locks() -> &'static Mutex<HashMap<PathBuf, Arc<Mutex<()>>>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    LOCKS.get_or_init(|| Mutex::new(HashMap::new()))
}

fn lock_for(path: &Path) -> Arc<Mutex<()>> {
    let mut locks = extraction_locks().lock().unwrap_or_else(|e| e.into_inner());
    locks.entry(path.to_path_buf()).or_default().clone()
}

/// Reads a compressed multi-resolution tile archive into bands grouped by
/// native resolution.
///
/// The flow is linear: extract (once), locate the metadata descriptor, open
/// it as a raster container, match one sub-dataset per fixed resolution
/// group, then pull that group's bands by position and scale digital
/// numbers to unit reflectance.
#[derive(Debug, Clone, Copy, Default)]
pub struct TileArchiveBandReader;

impl TileArchiveBandReader {
    pub fn new() -> Self {
        Self
    }

    /// Read all available resolution groups from the archive at `path`.
    ///
    /// A resolution group with no matching sub-dataset is absent from the
    /// result, not an error; callers treat missing bands as expected.
    pub fn read(&self, archive_path: &Path, cancel: Option<&CancelToken>) -> SatResult<BandSet> {
        if let Some(token) = cancel {
            token.checkpoint()?;
        }

        let tile_dir = self.ensure_extracted(archive_path)?;
        let descriptor = metadata::locate_metadata(&tile_dir)?;

        let info = match ProductInfo::from_file(&descriptor) {
            Ok(info) => info,
            Err(e) => {
                log::warn!(
                    "Could not parse {}: {}; using default quantification",
                    descriptor.display(),
                    e
                );
                ProductInfo::default()
            }
        };
        let quantification = info.quantification_or_default();

        let container = Dataset::open(&descriptor).map_err(|e| SatError::RasterOpen {
            path: descriptor.clone(),
            message: e.to_string(),
        })?;
        let subdatasets = list_subdatasets(&container);
        log::debug!(
            "{} sub-dataset(s) in {}",
            subdatasets.len(),
            descriptor.display()
        );

        let mut bands = BandSet::new();

        for resolution in Resolution::ALL {
            if let Some(token) = cancel {
                token.checkpoint()?;
            }

            // First matching sub-dataset wins, in index order
            let matched = subdatasets
                .iter()
                .find(|sub| sub.description.contains(&resolution.label()));

            let sub = match matched {
                Some(sub) => sub,
                None => {
                    log::debug!("No sub-dataset at {} in {}", resolution, descriptor.display());
                    continue;
                }
            };

            self.read_group(sub, resolution, quantification, &mut bands)?;
        }

        log::info!(
            "Assembled {} band(s) from {}",
            bands.len(),
            archive_path.display()
        );
        Ok(bands)
    }

    /// Extract the archive next to itself unless its tile directory already
    /// carries the completion marker. Serialized per archive path.
    fn ensure_extracted(&self, archive_path: &Path) -> SatResult<PathBuf> {
        let tile_dir = product_dir_for(archive_path)?;
        let lock = lock_for(archive_path);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let marker = tile_dir.join(EXTRACTION_MARKER);
        if marker.exists() {
            log::debug!("{} already extracted, skipping", archive_path.display());
            return Ok(tile_dir);
        }

        let parent = archive_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        log::info!(
            "Extracting {} into {}",
            archive_path.display(),
            parent.display()
        );

        let file = File::open(archive_path).map_err(|e| SatError::ArchiveRead {
            path: archive_path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut archive = ZipArchive::new(file).map_err(|e| SatError::ArchiveRead {
            path: archive_path.to_path_buf(),
            message: e.to_string(),
        })?;
        archive.extract(&parent).map_err(|e| SatError::ArchiveRead {
            path: archive_path.to_path_buf(),
            message: e.to_string(),
        })?;

        if !tile_dir.is_dir() {
            return Err(SatError::ArchiveRead {
                path: archive_path.to_path_buf(),
                message: format!(
                    "archive did not produce the expected tile directory {}",
                    tile_dir.display()
                ),
            });
        }

        std::fs::write(&marker, b"")?;
        Ok(tile_dir)
    }

    fn read_group(
        &self,
        sub: &SubDataset,
        resolution: Resolution,
        quantification: f32,
        bands: &mut BandSet,
    ) -> SatResult<()> {
        log::debug!("Opening {} sub-dataset {}", resolution, sub.name);

        let dataset = Dataset::open(Path::new(&sub.name)).map_err(|e| SatError::RasterOpen {
            path: PathBuf::from(&sub.name),
            message: e.to_string(),
        })?;

        let (width, height) = dataset.raster_size();
        let band_count = dataset.raster_count();
        let expected = resolution.band_names();

        if (band_count as usize) < expected.len() {
            log::warn!(
                "{} sub-dataset exposes {} band(s), expected {}",
                resolution,
                band_count,
                expected.len()
            );
        }

        // Bands map by position against the fixed per-resolution list
        for (position, band_name) in expected.iter().enumerate() {
            let index = position as isize + 1;
            if index > band_count {
                break;
            }

            let band = dataset.rasterband(index)?;
            let buffer = band.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
            let mut grid = Array2::from_shape_vec((height, width), buffer.data).map_err(|e| {
                SatError::InvalidFormat(format!("failed to reshape band {}: {}", band_name, e))
            })?;

            // Digital numbers to unit reflectance
            grid.mapv_inplace(|v| v / quantification);

            bands.insert(*band_name, Some(resolution.meters()), grid);
        }

        Ok(())
    }
}

/// Tile directory for an archive: same basename, fixed product suffix,
/// sibling to the archive
pub fn product_dir_for(archive_path: &Path) -> SatResult<PathBuf> {
    let stem = archive_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| SatError::ArchiveRead {
            path: archive_path.to_path_buf(),
            message: "archive has no usable file name".to_string(),
        })?;

    let dir_name = format!("{}{}", stem, PRODUCT_DIR_SUFFIX);
    Ok(match archive_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(dir_name),
        _ => PathBuf::from(dir_name),
    })
}

#[derive(Debug, Clone)]
struct SubDataset {
    name: String,
    description: String,
}

/// Enumerate the container's sub-datasets as (name, description) pairs,
/// ordered by their index in the SUBDATASETS metadata domain
fn list_subdatasets(container: &Dataset) -> Vec<SubDataset> {
    let mut by_index: std::collections::BTreeMap<u32, (Option<String>, Option<String>)> =
        std::collections::BTreeMap::new();

    for line in container.metadata_domain("SUBDATASETS").unwrap_or_default() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let Some(rest) = key.strip_prefix("SUBDATASET_") else {
            continue;
        };

        if let Some(idx) = rest.strip_suffix("_NAME") {
            if let Ok(idx) = idx.parse::<u32>() {
                by_index.entry(idx).or_default().0 = Some(value.to_string());
            }
        } else if let Some(idx) = rest.strip_suffix("_DESC") {
            if let Ok(idx) = idx.parse::<u32>() {
                by_index.entry(idx).or_default().1 = Some(value.to_string());
            }
        }
    }

    by_index
        .into_values()
        .filter_map(|(name, description)| {
            name.map(|name| SubDataset {
                name,
                description: description.unwrap_or_default(),
            })
        })
        .collect()
}
