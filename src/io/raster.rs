use crate::types::{BandSet, SatError, SatResult};
use gdal::{Dataset, Metadata};
use ndarray::Array2;
use std::path::Path;

/// Reads every named band of a single multi-band raster product.
///
/// Band descriptions are the band identifiers (the enhancement service
/// writes "B4", "B3", ... into them). The source file is never mutated.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterBandReader {
    reject_unnamed: bool,
}

impl RasterBandReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, a band with an empty description string fails the read
    /// instead of landing under the empty-string key.
    pub fn reject_unnamed(mut self, reject: bool) -> Self {
        self.reject_unnamed = reject;
        self
    }

    /// Read all bands of the raster at `path` into a band set
    pub fn read<P: AsRef<Path>>(&self, path: P) -> SatResult<BandSet> {
        let path = path.as_ref();
        log::info!("Reading raster bands from {}", path.display());

        let dataset = Dataset::open(path).map_err(|e| SatError::RasterOpen {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let (width, height) = dataset.raster_size();
        let band_count = dataset.raster_count();
        log::debug!("Raster size {}x{}, {} band(s)", width, height, band_count);

        let mut bands = BandSet::new();

        for index in 1..=band_count {
            let band = match dataset.rasterband(index) {
                Ok(band) => band,
                Err(e) => {
                    // A band we cannot get a handle on is skipped, not fatal
                    log::warn!("Skipping band {} of {}: {}", index, path.display(), e);
                    continue;
                }
            };

            let name = band.description()?;
            if name.is_empty() {
                if self.reject_unnamed {
                    return Err(SatError::InvalidFormat(format!(
                        "band {} of {} has no description",
                        index,
                        path.display()
                    )));
                }
                log::warn!("Band {} of {} has no description", index, path.display());
            }

            let buffer = band.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
            let grid = Array2::from_shape_vec((height, width), buffer.data).map_err(|e| {
                SatError::InvalidFormat(format!("failed to reshape band {}: {}", index, e))
            })?;

            bands.insert(name, None, grid);
        }

        log::info!("Read {} band(s) from {}", bands.len(), path.display());
        Ok(bands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_raster_open_error() {
        let err = RasterBandReader::new()
            .read("/nonexistent/product.tif")
            .unwrap_err();
        assert!(matches!(err, SatError::RasterOpen { .. }));
    }
}
