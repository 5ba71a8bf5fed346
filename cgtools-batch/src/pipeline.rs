//! The two three-stage pipelines
//!
//! Stage A (parallel per-ID lookups) fully drains before Stage B (batched
//! resolution) starts; Stage C then assembles the report in input order.

use crate::batch::{self, L2_CACHE_CHUNK_SIZE, ROOTS_CHUNK_SIZE};
use crate::client::{ChunkedGraph, ClientError, StopLayer};
use crate::fanout::{self, FanOutOptions};
use crate::report::{CoordinateReport, ValidationReport};
use cgtools_common::config::{Settings, DEFAULT_WORKERS};
use cgtools_common::InputId;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub workers: usize,
    pub task_timeout: Option<Duration>,
    pub roots_chunk_size: usize,
    pub l2_chunk_size: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            task_timeout: None,
            roots_chunk_size: ROOTS_CHUNK_SIZE,
            l2_chunk_size: L2_CACHE_CHUNK_SIZE,
        }
    }
}

impl From<&Settings> for PipelineOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            workers: settings.workers,
            task_timeout: settings.task_timeout,
            ..Self::default()
        }
    }
}

/// Wall-clock time spent in each stage
#[derive(Debug, Clone, Copy, Default)]
pub struct StageTimings {
    pub lookups: Duration,
    pub batch: Duration,
    pub total: Duration,
}

#[derive(Debug, Clone)]
pub struct ValidationRun {
    pub report: ValidationReport,
    pub timings: StageTimings,
}

#[derive(Debug, Clone)]
pub struct CoordinateRun {
    pub report: CoordinateReport,
    pub resolution: [f64; 3],
    pub timings: StageTimings,
}

/// Check each ID against its current root
pub async fn run_validation<C>(client: &C, ids: &[InputId], options: &PipelineOptions) -> ValidationRun
where
    C: ChunkedGraph + ?Sized,
{
    let start = Instant::now();

    tracing::info!("Step 1: Getting supervoxels ({} parallel workers)...", options.workers);
    let fan_out_options = FanOutOptions {
        workers: options.workers,
        stop_layer: StopLayer::Supervoxel,
        task_timeout: options.task_timeout,
    };
    let stage_a = fanout::fan_out(client, ids, &fan_out_options).await;
    let lookups = start.elapsed();

    tracing::info!("Step 2: Batch looking up current roots...");
    let batch_start = Instant::now();
    let leaves = stage_a.leaves_in_order(ids);
    let roots = batch::resolve_current_roots(client, &leaves, options.roots_chunk_size).await;
    let batch = batch_start.elapsed();

    tracing::info!("Step 3: Building results...");
    let report = ValidationReport::assemble(ids, &stage_a, &roots);

    ValidationRun {
        report,
        timings: StageTimings {
            lookups,
            batch,
            total: start.elapsed(),
        },
    }
}

/// Resolve a representative viewer coordinate for each ID
///
/// Fails only if the datastack resolution cannot be obtained or is unusable;
/// per-ID and per-chunk failures are reported as entries.
pub async fn run_coordinates<C>(
    client: &C,
    ids: &[InputId],
    options: &PipelineOptions,
) -> Result<CoordinateRun, ClientError>
where
    C: ChunkedGraph + ?Sized,
{
    let start = Instant::now();

    let resolution = client.datastack_info().await?.viewer_resolution();
    if resolution.iter().any(|r| !r.is_finite() || *r <= 0.0) {
        return Err(ClientError::Config(format!(
            "invalid viewer resolution {:?}",
            resolution
        )));
    }

    tracing::info!("Step 1: Getting L2 chunk IDs ({} parallel workers)...", options.workers);
    let fan_out_options = FanOutOptions {
        workers: options.workers,
        stop_layer: StopLayer::L2Chunk,
        task_timeout: options.task_timeout,
    };
    let stage_a = fanout::fan_out(client, ids, &fan_out_options).await;
    let lookups = start.elapsed();

    tracing::info!("Step 2: Batch fetching L2 coordinates...");
    let batch_start = Instant::now();
    let leaves = stage_a.leaves_in_order(ids);
    let coords = batch::fetch_rep_coords(client, &leaves, options.l2_chunk_size).await;
    let batch = batch_start.elapsed();

    tracing::info!("Step 3: Building output...");
    let report = CoordinateReport::assemble(ids, &stage_a, &coords, resolution);

    Ok(CoordinateRun {
        report,
        resolution,
        timings: StageTimings {
            lookups,
            batch,
            total: start.elapsed(),
        },
    })
}
