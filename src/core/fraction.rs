use crate::core::grid::GridAccumulator;
use crate::types::FractionGrid;
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// Compute the raw per-cell cloud fraction `cloud / total`.
///
/// Cells without observations come out as NaN; nothing is smoothed,
/// masked or interpolated.
pub fn cloud_fraction(grids: &GridAccumulator) -> FractionGrid {
    let mut fraction = FractionGrid::zeros(grids.total_pixels().raw_dim());
    Zip::from(&mut fraction)
        .and(grids.cloud_pixels())
        .and(grids.total_pixels())
        .for_each(|out, &cloud, &total| {
            *out = cloud as f64 / total as f64;
        });

    let degenerate = fraction.iter().filter(|v| !v.is_finite()).count();
    if degenerate > 0 {
        log::warn!(
            "{} of {} grid cells have no observations; their cloud fraction is NaN",
            degenerate,
            fraction.len()
        );
    }

    fraction
}

/// Descriptive statistics over a fraction grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FractionSummary {
    /// Cells with a finite fraction
    pub observed_cells: usize,
    /// Cells with zero total pixels (NaN fraction)
    pub degenerate_cells: usize,
    pub mean_fraction: Option<f64>,
    pub min_fraction: Option<f64>,
    pub max_fraction: Option<f64>,
}

impl FractionSummary {
    pub fn from_grid(fraction: &FractionGrid) -> Self {
        let mut observed = 0usize;
        let mut sum = 0.0f64;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for &value in fraction.iter().filter(|v| v.is_finite()) {
            observed += 1;
            sum += value;
            min = min.min(value);
            max = max.max(value);
        }

        let (mean_fraction, min_fraction, max_fraction) = if observed > 0 {
            (Some(sum / observed as f64), Some(min), Some(max))
        } else {
            (None, None, None)
        };

        Self {
            observed_cells: observed,
            degenerate_cells: fraction.len() - observed,
            mean_fraction,
            min_fraction,
            max_fraction,
        }
    }
}

impl std::fmt::Display for FractionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.mean_fraction, self.min_fraction, self.max_fraction) {
            (Some(mean), Some(min), Some(max)) => write!(
                f,
                "{} observed cells ({} empty), mean={:.4}, min={:.4}, max={:.4}",
                self.observed_cells, self.degenerate_cells, mean, min, max
            ),
            _ => write!(f, "no observed cells ({} empty)", self.degenerate_cells),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EdgePolicy, SwathData};
    use approx::assert_relative_eq;
    use ndarray::Array2;

    /// Build a swath with `total` pixels at (lat, lon), `cloudy` of them cloudy
    fn swath_at(lat: f64, lon: f64, total: usize, cloudy: usize) -> SwathData {
        let mask: Vec<u8> = (0..total).map(|i| if i < cloudy { 0 } else { 0b110 }).collect();
        SwathData::new(
            Array2::from_elem((1, total), lat),
            Array2::from_elem((1, total), lon),
            Array2::from_shape_vec((1, total), mask).unwrap(),
        )
    }

    #[test]
    fn test_fraction_quarter() {
        let mut acc = GridAccumulator::new();
        acc.accumulate(&swath_at(10.5, 20.5, 12, 3), EdgePolicy::Strict)
            .unwrap();

        let fraction = cloud_fraction(&acc);
        assert_relative_eq!(fraction[[100, 200]], 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_total_is_nan_and_does_not_halt() {
        let mut acc = GridAccumulator::new();
        acc.accumulate(&swath_at(-30.2, 100.0, 4, 4), EdgePolicy::Strict)
            .unwrap();

        let fraction = cloud_fraction(&acc);
        assert_eq!(fraction.dim(), (180, 360));
        assert!(fraction[[0, 0]].is_nan());
        assert!(fraction[[179, 359]].is_nan());
        assert_relative_eq!(fraction[[59, 279]], 1.0);
    }

    #[test]
    fn test_summary_counts() {
        let mut acc = GridAccumulator::new();
        acc.accumulate(&swath_at(0.5, 0.5, 4, 1), EdgePolicy::Strict)
            .unwrap();
        acc.accumulate(&swath_at(45.5, 45.5, 4, 3), EdgePolicy::Strict)
            .unwrap();

        let summary = FractionSummary::from_grid(&cloud_fraction(&acc));
        assert_eq!(summary.observed_cells, 2);
        assert_eq!(summary.degenerate_cells, 180 * 360 - 2);
        assert_relative_eq!(summary.mean_fraction.unwrap(), 0.5);
        assert_relative_eq!(summary.min_fraction.unwrap(), 0.25);
        assert_relative_eq!(summary.max_fraction.unwrap(), 0.75);
    }

    #[test]
    fn test_summary_of_empty_grid() {
        let summary = FractionSummary::from_grid(&cloud_fraction(&GridAccumulator::new()));
        assert_eq!(summary.observed_cells, 0);
        assert!(summary.mean_fraction.is_none());
        assert!(summary.to_string().starts_with("no observed cells"));
    }
}
