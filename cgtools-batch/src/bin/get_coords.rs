//! Fast parallel coordinate fetcher
//!
//! Resolves one L2 chunk per input ID with parallel workers, then fetches
//! cached representative coordinates in small batches and converts them to
//! viewer voxels. Output is tab-separated (`root_id`, `x`, `y`, `z`).
//!
//! **Usage:**
//! ```bash
//! get-coords --input ids.txt [--output coords.tsv] [--workers 20]
//! ```

use anyhow::{Context, Result};
use cgtools_batch::cli::{self, CommonArgs};
use cgtools_batch::{output, run_coordinates, CaveClient, PipelineOptions};
use clap::Parser;
use std::time::Instant;
use tracing::info;

/// Look up a representative viewer coordinate for each root ID
#[derive(Parser, Debug)]
#[command(name = "get-coords")]
#[command(version)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = cli::start("get-coords", &args.common)?;

    let ids = cli::read_ids(&args.common)?;
    if ids.is_empty() {
        eprintln!("No IDs found!");
        std::process::exit(1);
    }

    let output_path = args
        .common
        .output
        .clone()
        .unwrap_or_else(|| output::default_coords_output(&args.common.input));

    let started = Instant::now();
    let client = CaveClient::connect(&settings)
        .await
        .context("Failed to connect to chunked graph")?;

    let run = run_coordinates(&client, &ids, &PipelineOptions::from(&settings))
        .await
        .context("Coordinate lookup failed")?;
    let elapsed = started.elapsed();

    output::write_coordinates(&run, &output_path)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    info!(
        resolution = ?run.resolution,
        lookups_secs = run.timings.lookups.as_secs_f64(),
        batch_secs = run.timings.batch.as_secs_f64(),
        pipeline_secs = run.timings.total.as_secs_f64(),
        "Coordinate lookup finished"
    );

    println!("{}", output::coordinates_summary(&run, elapsed, &output_path));
    Ok(())
}
