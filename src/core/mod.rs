//! Core aggregation modules

pub mod cloud_mask;
pub mod grid;
pub mod fraction;
pub mod aggregate;

// Re-export main types
pub use cloud_mask::{decode_cloud_confidence, is_cloudy, CloudConfidence};
pub use grid::{geo_to_cell, GridAccumulator, SwathStats};
pub use fraction::{cloud_fraction, FractionSummary};
pub use aggregate::{
    AggregationOutcome, AggregationParams, AggregationReport, Aggregator, SkippedPair, SwathSource,
};
