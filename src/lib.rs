//! cloudgrid: Level 3 cloud fraction aggregation for MODIS swaths
//!
//! Counts total and cloudy pixels per 1-degree cell of a fixed 180 x 360
//! global grid across many paired geolocation (MYD03) and cloud (MYD06_L2)
//! granules, then derives the per-cell cloud fraction.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use crate::types::{
    CloudGridError, CloudGridResult, CountGrid, EdgePolicy, FractionGrid, GranuleId, GridCell,
    SwathData, SwathPair, GRID_COLS, GRID_ROWS,
};

pub use crate::core::{
    cloud_fraction, decode_cloud_confidence, geo_to_cell, AggregationParams, Aggregator,
    FractionSummary, GridAccumulator, SwathSource,
};
pub use crate::io::{GdalSwathReader, ProductPattern};
