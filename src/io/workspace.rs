use crate::types::{SatError, SatResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Session-scoped view of the mounted storage root.
///
/// An external collaborator guarantees the root is mounted before any of
/// this is called; the root itself is treated as an opaque directory under
/// which one subdirectory per region lives. All paths flow through this
/// object instead of ambient module state.
#[derive(Debug, Clone)]
pub struct RegionWorkspace {
    storage_root: PathBuf,
}

impl RegionWorkspace {
    pub fn new<P: AsRef<Path>>(storage_root: P) -> Self {
        Self {
            storage_root: storage_root.as_ref().to_path_buf(),
        }
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Directory holding a region's downloaded and derived products
    pub fn region_dir(&self, region: &str) -> PathBuf {
        self.storage_root.join(region)
    }

    /// Raw product archives for a region: `.zip` (Sentinel-2) and `.gz`
    /// (Landsat-8), lexicographically sorted
    pub fn raw_archives(&self, region: &str) -> SatResult<Vec<PathBuf>> {
        let mut archives = self.files_with_extensions(region, &["zip", "gz"])?;
        archives.sort();
        Ok(archives)
    }

    /// Enhanced raster outputs for a region, lexicographically sorted
    pub fn enhanced_rasters(&self, region: &str) -> SatResult<Vec<PathBuf>> {
        let mut rasters = self.files_with_extensions(region, &["tif"])?;
        rasters.sort();
        Ok(rasters)
    }

    fn files_with_extensions(&self, region: &str, exts: &[&str]) -> SatResult<Vec<PathBuf>> {
        let dir = self.region_dir(region);
        let mut files = Vec::new();

        let entries = fs::read_dir(&dir).map_err(|e| {
            SatError::InvalidRegion(format!("cannot list {}: {}", dir.display(), e))
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                if exts.iter().any(|want| ext.eq_ignore_ascii_case(want)) {
                    files.push(path);
                }
            }
        }

        log::debug!(
            "{} matching file(s) under {} for {:?}",
            files.len(),
            dir.display(),
            exts
        );
        Ok(files)
    }

    /// Decompress a gzip-compressed product next to itself, returning the
    /// output path (input minus the `.gz` suffix). Overwrites any previous
    /// output.
    pub fn gunzip(&self, path: &Path) -> SatResult<PathBuf> {
        use flate2::read::GzDecoder;
        use std::io::Read;

        let output_path = path.with_extension("");
        log::info!("Decompressing {} -> {}", path.display(), output_path.display());

        let compressed = fs::read(path).map_err(|e| SatError::ArchiveRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| SatError::ArchiveRead {
                path: path.to_path_buf(),
                message: format!("gzip decompression failed: {}", e),
            })?;

        if decompressed.is_empty() {
            return Err(SatError::ArchiveRead {
                path: path.to_path_buf(),
                message: "decompressed product is empty".to_string(),
            });
        }

        fs::write(&output_path, decompressed)?;
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_dir_is_under_root() {
        let ws = RegionWorkspace::new("/mnt/storage");
        assert_eq!(ws.region_dir("Donana"), PathBuf::from("/mnt/storage/Donana"));
    }

    #[test]
    fn missing_region_dir_is_invalid_region() {
        let ws = RegionWorkspace::new("/nonexistent-root");
        let err = ws.raw_archives("Nowhere").unwrap_err();
        assert!(matches!(err, SatError::InvalidRegion(_)));
    }
}
