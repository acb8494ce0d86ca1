use crate::core::cloud_mask::CloudConfidence;
use crate::core::grid::{GridAccumulator, SwathStats};
use crate::io::discovery::parse_granule_id;
use crate::types::{CloudGridError, CloudGridResult, EdgePolicy, SwathData, SwathPair};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

/// Anything that can materialise a swath pair into memory
pub trait SwathSource: Sync {
    fn read_swath(&self, pair: &SwathPair) -> CloudGridResult<SwathData>;
}

/// Aggregation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationParams {
    /// Handling of cell indices past the northern/eastern grid edge
    pub edge_policy: EdgePolicy,
    /// Log and exclude failing pairs instead of aborting the run
    pub skip_bad_pairs: bool,
    /// Decode and accumulate pairs on the rayon pool (needs the `parallel` feature)
    pub parallel: bool,
}

impl Default for AggregationParams {
    fn default() -> Self {
        Self {
            edge_policy: EdgePolicy::Strict,
            skip_bad_pairs: false,
            parallel: true,
        }
    }
}

/// A pair excluded from the run in skip mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedPair {
    pub index: usize,
    pub geolocation: PathBuf,
    pub cloud_mask: PathBuf,
    pub reason: String,
}

/// Bookkeeping for one aggregation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationReport {
    pub pairs_total: usize,
    pub pairs_processed: usize,
    pub pairs_skipped: Vec<SkippedPair>,
    pub total_pixels: u64,
    pub cloud_pixels: u64,
    pub clamped_pixels: u64,
    /// Observed pixels per cloud-mask confidence level
    pub confidence_classes: BTreeMap<CloudConfidence, u64>,
    pub observed_cells: usize,
    pub first_granule: Option<NaiveDateTime>,
    pub last_granule: Option<NaiveDateTime>,
    pub edge_policy: EdgePolicy,
    pub parallel: bool,
    pub elapsed_seconds: f64,
}

/// Grids plus the report describing how they were built
#[derive(Debug, Clone)]
pub struct AggregationOutcome {
    pub grids: GridAccumulator,
    pub report: AggregationReport,
}

/// Partial result of one worker (or of the whole sequential run)
#[derive(Debug, Clone, Default)]
struct Partial {
    grids: GridAccumulator,
    processed: usize,
    clamped_pixels: u64,
    confidence_counts: [u64; 4],
    skipped: Vec<SkippedPair>,
}

impl Partial {
    fn record(&mut self, stats: SwathStats) {
        self.processed += 1;
        self.clamped_pixels += stats.clamped_pixels;
        self.add_confidence(&stats.confidence_counts);
    }

    fn add_confidence(&mut self, counts: &[u64; 4]) {
        for (total, n) in self.confidence_counts.iter_mut().zip(counts) {
            *total += n;
        }
    }

    fn confidence_classes(&self) -> BTreeMap<CloudConfidence, u64> {
        self.confidence_counts
            .iter()
            .enumerate()
            .map(|(code, &n)| (CloudConfidence::from_code(code as u8), n))
            .collect()
    }

    fn merged(mut self, other: Partial) -> Self {
        self.grids.merge(&other.grids);
        self.processed += other.processed;
        self.clamped_pixels += other.clamped_pixels;
        self.add_confidence(&other.confidence_counts);
        self.skipped.extend(other.skipped);
        self
    }
}

/// Drives swath reading and grid accumulation over an ordered pair list
pub struct Aggregator {
    params: AggregationParams,
}

impl Aggregator {
    pub fn new(params: AggregationParams) -> Self {
        Self { params }
    }

    /// Accumulate every pair into one set of grids.
    ///
    /// In strict mode the first failing pair aborts the run. With
    /// `skip_bad_pairs` failures are logged and reported instead, but a run
    /// in which no pair succeeded is still an error.
    pub fn run<S: SwathSource>(
        &self,
        source: &S,
        pairs: &[SwathPair],
    ) -> CloudGridResult<AggregationOutcome> {
        if pairs.is_empty() {
            return Err(CloudGridError::InputPairing(
                "no swath pairs to aggregate".to_string(),
            ));
        }

        let parallel = self.params.parallel && cfg!(feature = "parallel");
        log::info!(
            "Aggregating {} swath pairs ({}, edge policy: {})",
            pairs.len(),
            if parallel { "parallel" } else { "sequential" },
            self.params.edge_policy
        );
        let start_time = Instant::now();

        let mut partial = if parallel {
            self.run_parallel(source, pairs)?
        } else {
            self.run_sequential(source, pairs)?
        };
        partial.skipped.sort_by_key(|s| s.index);

        if partial.processed == 0 {
            return Err(CloudGridError::Processing(format!(
                "all {} swath pairs failed; nothing was aggregated",
                pairs.len()
            )));
        }
        partial.grids.check_invariant()?;

        let granules: Vec<NaiveDateTime> = pairs
            .iter()
            .filter_map(|p| p.geolocation.file_name()?.to_str())
            .filter_map(parse_granule_id)
            .filter_map(|id| id.start_time())
            .collect();

        let elapsed = start_time.elapsed();
        let report = AggregationReport {
            pairs_total: pairs.len(),
            pairs_processed: partial.processed,
            pairs_skipped: partial.skipped.clone(),
            total_pixels: partial.grids.total_observations(),
            cloud_pixels: partial.grids.cloud_observations(),
            clamped_pixels: partial.clamped_pixels,
            confidence_classes: partial.confidence_classes(),
            observed_cells: partial.grids.observed_cells(),
            first_granule: granules.iter().min().copied(),
            last_granule: granules.iter().max().copied(),
            edge_policy: self.params.edge_policy,
            parallel,
            elapsed_seconds: elapsed.as_secs_f64(),
        };

        log::info!(
            "Aggregation complete: {}/{} pairs, {} pixels ({} cloudy) over {} cells in {:?}",
            report.pairs_processed,
            report.pairs_total,
            report.total_pixels,
            report.cloud_pixels,
            report.observed_cells,
            elapsed
        );
        for (confidence, n) in &report.confidence_classes {
            log::info!("  {}: {} pixels", confidence, n);
        }
        if !report.pairs_skipped.is_empty() {
            log::warn!("{} swath pairs were skipped", report.pairs_skipped.len());
        }

        Ok(AggregationOutcome {
            grids: partial.grids,
            report,
        })
    }

    fn run_sequential<S: SwathSource>(
        &self,
        source: &S,
        pairs: &[SwathPair],
    ) -> CloudGridResult<Partial> {
        let mut partial = Partial::default();
        for (index, pair) in pairs.iter().enumerate() {
            self.process_pair(source, index, pair, &mut partial)?;
        }
        Ok(partial)
    }

    #[cfg(feature = "parallel")]
    fn run_parallel<S: SwathSource>(
        &self,
        source: &S,
        pairs: &[SwathPair],
    ) -> CloudGridResult<Partial> {
        use rayon::prelude::*;

        // Each worker folds into its own grids; only the sums meet
        pairs
            .par_iter()
            .enumerate()
            .try_fold(
                Partial::default,
                |mut partial, (index, pair)| -> CloudGridResult<Partial> {
                    self.process_pair(source, index, pair, &mut partial)?;
                    Ok(partial)
                },
            )
            .try_reduce(Partial::default, |a, b| Ok(a.merged(b)))
    }

    #[cfg(not(feature = "parallel"))]
    fn run_parallel<S: SwathSource>(
        &self,
        source: &S,
        pairs: &[SwathPair],
    ) -> CloudGridResult<Partial> {
        self.run_sequential(source, pairs)
    }

    fn process_pair<S: SwathSource>(
        &self,
        source: &S,
        index: usize,
        pair: &SwathPair,
        partial: &mut Partial,
    ) -> CloudGridResult<()> {
        log::debug!(
            "Pair {}: {} + {}",
            index,
            pair.geolocation.display(),
            pair.cloud_mask.display()
        );

        let result = source
            .read_swath(pair)
            .and_then(|swath| partial.grids.accumulate(&swath, self.params.edge_policy));

        match result {
            Ok(stats) => {
                log::debug!(
                    "Pair {}: {} pixels, {} cloudy, {} clamped",
                    index,
                    stats.pixels,
                    stats.cloudy_pixels,
                    stats.clamped_pixels
                );
                partial.record(stats);
                Ok(())
            }
            Err(e) => {
                let err = e.in_pair(pair);
                if self.params.skip_bad_pairs {
                    log::warn!("Skipping pair {}: {}", index, err);
                    partial.skipped.push(SkippedPair {
                        index,
                        geolocation: pair.geolocation.clone(),
                        cloud_mask: pair.cloud_mask.clone(),
                        reason: err.to_string(),
                    });
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }
}
