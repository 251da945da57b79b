use crate::types::BandArray;

/// Summary statistics for one band, as shown next to a rendered image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub std: f32,
}

impl BandStats {
    /// Min/max/mean/population standard deviation over the full grid.
    /// Returns None for an empty array.
    pub fn compute(band: &BandArray) -> Option<Self> {
        if band.is_empty() {
            return None;
        }

        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &v in band.iter() {
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
        }

        let n = band.len() as f32;
        let mean = band.sum() / n;
        let var = band.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;

        Some(Self {
            min,
            max,
            mean,
            std: var.sqrt(),
        })
    }
}

impl std::fmt::Display for BandStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "min = {}, max = {}, mean = {}, std = {}",
            self.min, self.max, self.mean, self.std
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn stats_over_known_values() {
        let band = array![[1.0f32, 2.0], [3.0, 4.0]];
        let stats = BandStats::compute(&band).unwrap();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert_relative_eq!(stats.mean, 2.5);
        assert_relative_eq!(stats.std, 1.118034, epsilon = 1e-5);
    }

    #[test]
    fn empty_band_yields_none() {
        let band = BandArray::zeros((0, 0));
        assert!(BandStats::compute(&band).is_none());
    }
}
