use crate::core::cloud_mask::{decode_cloud_confidence, is_cloudy};
use crate::types::{
    CloudGridError, CloudGridResult, CountGrid, EdgePolicy, GridCell, SwathData, GRID_COLS,
    GRID_ROWS,
};
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// Latitude offset; -89.5 deg lands on the start of row 0
pub const LATITUDE_OFFSET: f64 = 89.5;

/// Longitude offset; -179.5 deg lands on the start of column 0
pub const LONGITUDE_OFFSET: f64 = 179.5;

/// Outcome of binning one coordinate along one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinIndex {
    Inside(usize),
    ClampedLow,
    ClampedHigh(usize),
}

/// Offset-and-floor binning for one axis.
///
/// Negative indices always clamp to 0. Indices at or past `len` clamp to
/// `len - 1` under `EdgePolicy::Clamp` and come back as `Err(raw_index)`
/// under `EdgePolicy::Strict`.
fn bin_index(
    value: f64,
    offset: f64,
    len: usize,
    policy: EdgePolicy,
) -> Result<BinIndex, i64> {
    let raw = (value + offset).floor() as i64;
    if raw < 0 {
        Ok(BinIndex::ClampedLow)
    } else if (raw as usize) < len {
        Ok(BinIndex::Inside(raw as usize))
    } else {
        match policy {
            EdgePolicy::Strict => Err(raw),
            EdgePolicy::Clamp => Ok(BinIndex::ClampedHigh(len - 1)),
        }
    }
}

impl BinIndex {
    fn index(self) -> usize {
        match self {
            BinIndex::Inside(i) | BinIndex::ClampedHigh(i) => i,
            BinIndex::ClampedLow => 0,
        }
    }

    fn was_clamped(self) -> bool {
        !matches!(self, BinIndex::Inside(_))
    }
}

fn map_pixel(
    latitude: f64,
    longitude: f64,
    policy: EdgePolicy,
    pixel: (usize, usize),
) -> CloudGridResult<(GridCell, bool)> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(CloudGridError::InvalidFormat(format!(
            "non-finite geolocation at pixel {:?}: lat={}, lon={}",
            pixel, latitude, longitude
        )));
    }

    let row = bin_index(latitude, LATITUDE_OFFSET, GRID_ROWS, policy);
    let col = bin_index(longitude, LONGITUDE_OFFSET, GRID_COLS, policy);

    match (row, col) {
        (Ok(row), Ok(col)) => Ok((
            GridCell {
                row: row.index(),
                col: col.index(),
            },
            row.was_clamped() || col.was_clamped(),
        )),
        (row, col) => Err(CloudGridError::IndexOutOfRange {
            latitude,
            longitude,
            row: row.map(|r| r.index() as i64).unwrap_or_else(|raw| raw),
            col: col.map(|c| c.index() as i64).unwrap_or_else(|raw| raw),
            pixel,
        }),
    }
}

/// Map a geographic position to its 1-degree grid cell.
///
/// `row = floor(lat + 89.5)`, `col = floor(lon + 179.5)`, so lat 90 and
/// lon 180 still land on row 179 and column 359. Negative indices clamp
/// to 0; indices past 179/359 (lat >= 90.5, lon >= 180.5) follow `policy`.
pub fn geo_to_cell(
    latitude: f64,
    longitude: f64,
    policy: EdgePolicy,
) -> CloudGridResult<GridCell> {
    map_pixel(latitude, longitude, policy, (0, 0)).map(|(cell, _)| cell)
}

/// Counts contributed by a single swath
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwathStats {
    pub pixels: u64,
    pub cloudy_pixels: u64,
    /// Pixels whose cell index had to be clamped onto the grid
    pub clamped_pixels: u64,
    /// Pixel counts per confidence code (0 = confident cloudy .. 3 = confident clear)
    pub confidence_counts: [u64; 4],
}

/// Running total/cloudy pixel counts over the fixed 180 x 360 grid
#[derive(Debug, Clone, PartialEq)]
pub struct GridAccumulator {
    total_pixels: CountGrid,
    cloud_pixels: CountGrid,
}

impl Default for GridAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl GridAccumulator {
    /// Create zeroed grids
    pub fn new() -> Self {
        Self {
            total_pixels: CountGrid::zeros((GRID_ROWS, GRID_COLS)),
            cloud_pixels: CountGrid::zeros((GRID_ROWS, GRID_COLS)),
        }
    }

    pub fn total_pixels(&self) -> &CountGrid {
        &self.total_pixels
    }

    pub fn cloud_pixels(&self) -> &CountGrid {
        &self.cloud_pixels
    }

    /// Add one swath's pixels to the grids.
    ///
    /// Every pixel is mapped before any counter moves, so an error leaves
    /// the accumulator exactly as it was.
    pub fn accumulate(
        &mut self,
        swath: &SwathData,
        policy: EdgePolicy,
    ) -> CloudGridResult<SwathStats> {
        let shape = swath.dim();
        if swath.longitude.dim() != shape {
            return Err(CloudGridError::ShapeMismatch {
                what: "longitude".to_string(),
                expected: shape,
                found: swath.longitude.dim(),
            });
        }
        if swath.cloud_mask.dim() != shape {
            return Err(CloudGridError::ShapeMismatch {
                what: "cloud mask".to_string(),
                expected: shape,
                found: swath.cloud_mask.dim(),
            });
        }

        let mut total = CountGrid::zeros((GRID_ROWS, GRID_COLS));
        let mut cloud = CountGrid::zeros((GRID_ROWS, GRID_COLS));
        let mut stats = SwathStats::default();

        let pixels = swath
            .latitude
            .indexed_iter()
            .zip(swath.longitude.iter().zip(swath.cloud_mask.iter()));

        for ((pixel, &lat), (&lon, &raw)) in pixels {
            let (cell, clamped) = map_pixel(lat, lon, policy, pixel)?;
            total[[cell.row, cell.col]] += 1;
            stats.pixels += 1;
            if clamped {
                stats.clamped_pixels += 1;
            }
            let code = decode_cloud_confidence(raw);
            stats.confidence_counts[code as usize] += 1;
            if is_cloudy(code) {
                cloud[[cell.row, cell.col]] += 1;
                stats.cloudy_pixels += 1;
            }
        }

        self.total_pixels += &total;
        self.cloud_pixels += &cloud;

        Ok(stats)
    }

    /// Elementwise sum of another accumulator into this one
    pub fn merge(&mut self, other: &GridAccumulator) {
        self.total_pixels += &other.total_pixels;
        self.cloud_pixels += &other.cloud_pixels;
    }

    pub fn total_observations(&self) -> u64 {
        self.total_pixels.sum()
    }

    pub fn cloud_observations(&self) -> u64 {
        self.cloud_pixels.sum()
    }

    /// Number of cells with at least one observed pixel
    pub fn observed_cells(&self) -> usize {
        self.total_pixels.iter().filter(|&&n| n > 0).count()
    }

    /// Verify `cloud <= total` in every cell
    pub fn check_invariant(&self) -> CloudGridResult<()> {
        let mut violation = None;
        Zip::indexed(&self.cloud_pixels)
            .and(&self.total_pixels)
            .for_each(|(row, col), &cloud, &total| {
                if cloud > total && violation.is_none() {
                    violation = Some((GridCell { row, col }, cloud, total));
                }
            });

        match violation {
            Some((cell, cloud, total)) => Err(CloudGridError::Processing(format!(
                "cell {} has {} cloudy pixels but only {} total",
                cell, cloud, total
            ))),
            None => Ok(()),
        }
    }
}
