//! Fast parallel ID validator
//!
//! Resolves one supervoxel per input ID with parallel workers, then looks up
//! the current roots of all supervoxels in large batches.
//!
//! **Usage:**
//! ```bash
//! validate-ids --input ids.txt [--output results.txt] [--workers 20]
//! ```

use anyhow::{Context, Result};
use cgtools_batch::cli::{self, CommonArgs};
use cgtools_batch::{output, run_validation, CaveClient, PipelineOptions};
use clap::Parser;
use std::time::Instant;
use tracing::info;

/// Check root IDs against the latest chunked graph and report remappings
#[derive(Parser, Debug)]
#[command(name = "validate-ids")]
#[command(version)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = cli::start("validate-ids", &args.common)?;

    let ids = cli::read_ids(&args.common)?;
    if ids.is_empty() {
        eprintln!("No IDs found!");
        std::process::exit(1);
    }

    let output_path = args
        .common
        .output
        .clone()
        .unwrap_or_else(|| output::default_validation_output(&args.common.input));

    let started = Instant::now();
    let client = CaveClient::connect(&settings)
        .await
        .context("Failed to connect to chunked graph")?;

    let run = run_validation(&client, &ids, &PipelineOptions::from(&settings)).await;
    let elapsed = started.elapsed();

    let clean_path = output::write_validation(&run, &output_path, settings.workers, elapsed)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    info!(
        lookups_secs = run.timings.lookups.as_secs_f64(),
        batch_secs = run.timings.batch.as_secs_f64(),
        pipeline_secs = run.timings.total.as_secs_f64(),
        "Validation finished"
    );

    println!("{}", output::validation_summary(&run, elapsed, &output_path, &clean_path));
    Ok(())
}
