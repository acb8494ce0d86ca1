use chrono::{NaiveDate, NaiveDateTime};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Number of 1-degree latitude bands (row 0 starts at -90 deg)
pub const GRID_ROWS: usize = 180;

/// Number of 1-degree longitude bands (column 0 starts at -180 deg)
pub const GRID_COLS: usize = 360;

/// Per-cell pixel counter grid (GRID_ROWS x GRID_COLS)
pub type CountGrid = Array2<u64>;

/// Per-cell cloud fraction grid, NaN where nothing was observed
pub type FractionGrid = Array2<f64>;

/// Per-pixel geolocation plane (latitude or longitude, degrees)
pub type GeoPlane = Array2<f64>;

/// Per-pixel raw cloud-mask byte plane
pub type MaskPlane = Array2<u8>;

/// One cell of the global grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
}

impl std::fmt::Display for GridCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.row, self.col)
    }
}

/// How indices beyond the northern/eastern grid edge are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum EdgePolicy {
    /// High-side overflow is a fatal `IndexOutOfRange`
    #[default]
    Strict,
    /// High-side overflow is clamped to the last row/column
    Clamp,
}

impl std::fmt::Display for EdgePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgePolicy::Strict => write!(f, "strict"),
            EdgePolicy::Clamp => write!(f, "clamp"),
        }
    }
}

/// A geolocation product and the cloud-mask product of the same overpass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwathPair {
    pub geolocation: PathBuf,
    pub cloud_mask: PathBuf,
}

impl SwathPair {
    pub fn new(geolocation: impl Into<PathBuf>, cloud_mask: impl Into<PathBuf>) -> Self {
        Self {
            geolocation: geolocation.into(),
            cloud_mask: cloud_mask.into(),
        }
    }
}

/// Fully materialised contents of one swath pair
#[derive(Debug, Clone)]
pub struct SwathData {
    pub latitude: GeoPlane,
    pub longitude: GeoPlane,
    /// Raw (undecoded) cloud-mask byte for each pixel
    pub cloud_mask: MaskPlane,
}

impl SwathData {
    pub fn new(latitude: GeoPlane, longitude: GeoPlane, cloud_mask: MaskPlane) -> Self {
        Self {
            latitude,
            longitude,
            cloud_mask,
        }
    }

    /// Swath dimensions as (along-track, across-track)
    pub fn dim(&self) -> (usize, usize) {
        self.latitude.dim()
    }
}

/// MODIS granule identifier taken from the `AYYYYDDD.HHMM` filename token
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GranuleId {
    pub year: i32,
    pub day_of_year: u32,
    pub hour: u32,
    pub minute: u32,
}

impl GranuleId {
    /// Start time of the granule, `None` for an impossible date
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_yo_opt(self.year, self.day_of_year)?.and_hms_opt(self.hour, self.minute, 0)
    }
}

impl std::fmt::Display for GranuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "A{:04}{:03}.{:02}{:02}",
            self.year, self.day_of_year, self.hour, self.minute
        )
    }
}

/// Error types for cloud fraction aggregation
#[derive(Debug, thiserror::Error)]
pub enum CloudGridError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Input pairing error: {0}")]
    InputPairing(String),

    #[error("Shape mismatch for {what}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        what: String,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Index out of range at pixel {pixel:?}: ({latitude}, {longitude}) -> [{row}, {col}]")]
    IndexOutOfRange {
        latitude: f64,
        longitude: f64,
        row: i64,
        col: i64,
        pixel: (usize, usize),
    },

    #[error("Failed on pair {geolocation} + {cloud_mask}: {source}")]
    Pair {
        geolocation: PathBuf,
        cloud_mask: PathBuf,
        #[source]
        source: Box<CloudGridError>,
    },

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Plot error: {0}")]
    Plot(String),
}

impl CloudGridError {
    /// Attach the offending pair to an error raised while processing it
    pub fn in_pair(self, pair: &SwathPair) -> Self {
        CloudGridError::Pair {
            geolocation: pair.geolocation.clone(),
            cloud_mask: pair.cloud_mask.clone(),
            source: Box::new(self),
        }
    }
}

/// Result type for aggregation operations
pub type CloudGridResult<T> = Result<T, CloudGridError>;
