//! Monthly Level 3 cloud fraction from MODIS MYD03 + MYD06_L2 swaths.
use anyhow::{Context, Result};
use clap::Parser;
use cloudgrid::core::{
    cloud_fraction, AggregationParams, AggregationReport, Aggregator, FractionSummary,
};
use cloudgrid::io::{
    discover_pairs, render_fraction_map, write_fraction_grid, GdalSwathReader, PlotStyle,
    ProductPattern,
};
use cloudgrid::EdgePolicy;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "cloudgrid", about = "Aggregate MODIS swaths into a 1-degree cloud fraction map")]
struct Args {
    /// Directory holding the geolocation (MYD03) granules
    #[arg(long)]
    geo_dir: PathBuf,

    /// Directory holding the cloud product (MYD06_L2) granules
    #[arg(long)]
    mask_dir: PathBuf,

    /// Acquisition token prefix selecting the period, e.g. A2008 or A2008032
    #[arg(short, long)]
    date: String,

    #[arg(long, default_value = "MYD03")]
    geo_product: String,

    #[arg(long, default_value = "MYD06_L2")]
    mask_product: String,

    #[arg(long, default_value = "hdf")]
    extension: String,

    /// Output array file (.nc for netCDF, .tif for GeoTIFF)
    #[arg(short, long)]
    output: PathBuf,

    /// Output PNG map
    #[arg(short, long)]
    image: PathBuf,

    /// Optional JSON run summary
    #[arg(long)]
    summary: Option<PathBuf>,

    #[arg(long, default_value = "Latitude")]
    latitude_field: String,

    #[arg(long, default_value = "Longitude")]
    longitude_field: String,

    #[arg(long, default_value = "Cloud_Mask_1km")]
    mask_field: String,

    /// 1-based band of the mask field holding the confidence byte
    #[arg(long, default_value_t = 1)]
    mask_band: usize,

    #[arg(long, value_enum, default_value = "strict")]
    edge_policy: EdgePolicy,

    /// Log and exclude unreadable or malformed pairs instead of aborting
    #[arg(long)]
    skip_bad_pairs: bool,

    /// Process pairs one after another on the main thread
    #[arg(long)]
    sequential: bool,

    /// Worker threads for parallel aggregation (default: all cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Plot title
    #[arg(long, default_value = "Level 3 Cloud Fraction Aggregation For One Month")]
    title: String,
}

#[derive(Serialize)]
struct RunSummary<'a> {
    aggregation: &'a AggregationReport,
    fraction: &'a FractionSummary,
    output: &'a PathBuf,
    image: &'a PathBuf,
}

fn run(args: Args) -> Result<()> {
    let start_time = Instant::now();

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    let geo_pattern =
        ProductPattern::new(&args.geo_product, &args.date).with_extension(&args.extension);
    let mask_pattern =
        ProductPattern::new(&args.mask_product, &args.date).with_extension(&args.extension);

    let pairs = discover_pairs(&args.geo_dir, &geo_pattern, &args.mask_dir, &mask_pattern)
        .context("Failed to assemble swath pairs")?;
    log::info!("Assembled {} swath pairs", pairs.len());

    let reader = GdalSwathReader {
        latitude_field: args.latitude_field.clone(),
        longitude_field: args.longitude_field.clone(),
        mask_field: args.mask_field.clone(),
        mask_band: args.mask_band,
    };
    let aggregator = Aggregator::new(AggregationParams {
        edge_policy: args.edge_policy,
        skip_bad_pairs: args.skip_bad_pairs,
        parallel: !args.sequential,
    });

    let outcome = aggregator.run(&reader, &pairs).context("Aggregation failed")?;

    let fraction = cloud_fraction(&outcome.grids);
    let fraction_summary = FractionSummary::from_grid(&fraction);
    log::info!("Cloud fraction: {}", fraction_summary);

    write_fraction_grid(&fraction, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    let style = PlotStyle {
        title: args.title.clone(),
        ..PlotStyle::default()
    };
    render_fraction_map(&fraction, &args.image, &style)
        .with_context(|| format!("Failed to render {}", args.image.display()))?;

    if let Some(summary_path) = &args.summary {
        let summary = RunSummary {
            aggregation: &outcome.report,
            fraction: &fraction_summary,
            output: &args.output,
            image: &args.image,
        };
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(summary_path, json)
            .with_context(|| format!("Failed to write {}", summary_path.display()))?;
        log::info!("Run summary saved: {}", summary_path.display());
    }

    log::info!("Total program execution time: {:?}", start_time.elapsed());
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}
