//! Stage A: per-ID leaf lookups with bounded concurrency
//!
//! One remote call per distinct input ID, at most `workers` in flight. Results
//! are consumed in completion order by a single loop, which is the only writer
//! of the result maps, so no locking is needed. Input order is restored later
//! by the report assembler.

use crate::client::{ChunkedGraph, ClientError, LeafId, StopLayer};
use cgtools_common::InputId;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Progress is logged every this many completions
pub const PROGRESS_INTERVAL: usize = 500;

/// Reason recorded when the service returns no descendants
pub const NO_LEAVES_REASON: &str = "no leaves found";

/// Result of a single lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Resolved(LeafId),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct FanOutOptions {
    /// Maximum concurrent lookups (at least 1)
    pub workers: usize,
    pub stop_layer: StopLayer,
    /// Per-lookup deadline; `None` waits as long as the client does
    pub task_timeout: Option<Duration>,
}

/// Stage A output: every distinct input ID is a key of exactly one map
#[derive(Debug, Default, Clone)]
pub struct FanOutResult {
    pub id_to_leaf: HashMap<InputId, LeafId>,
    pub errors: HashMap<InputId, String>,
}

impl FanOutResult {
    /// Outcome recorded for `id`, if it was part of the run
    pub fn outcome(&self, id: InputId) -> Option<LookupOutcome> {
        if let Some(reason) = self.errors.get(&id) {
            return Some(LookupOutcome::Failed(reason.clone()));
        }
        self.id_to_leaf.get(&id).map(|leaf| LookupOutcome::Resolved(*leaf))
    }

    /// Resolved leaves in first-seen input order, without duplicates
    pub fn leaves_in_order(&self, ids: &[InputId]) -> Vec<LeafId> {
        let mut seen = HashSet::new();
        ids.iter()
            .filter_map(|id| self.id_to_leaf.get(id))
            .filter(|leaf| seen.insert(**leaf))
            .copied()
            .collect()
    }
}

/// Resolve one input ID to its first leaf
///
/// Never returns an error: faults, empty answers and deadline expiry all
/// become `LookupOutcome::Failed`. No retry is attempted.
pub async fn lookup_one<C>(
    client: &C,
    id: InputId,
    stop_layer: StopLayer,
    task_timeout: Option<Duration>,
) -> LookupOutcome
where
    C: ChunkedGraph + ?Sized,
{
    let call = client.leaves(id, stop_layer);
    let result = match task_timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => return LookupOutcome::Failed(ClientError::Timeout(limit).to_string()),
        },
        None => call.await,
    };

    match result {
        Ok(leaves) => match leaves.first() {
            Some(leaf) => LookupOutcome::Resolved(*leaf),
            None => LookupOutcome::Failed(NO_LEAVES_REASON.to_string()),
        },
        Err(e) => LookupOutcome::Failed(e.to_string()),
    }
}

/// Run Stage A over `ids`
///
/// Duplicate IDs are looked up once. Returns after every lookup has finished.
pub async fn fan_out<C>(client: &C, ids: &[InputId], options: &FanOutOptions) -> FanOutResult
where
    C: ChunkedGraph + ?Sized,
{
    let mut seen = HashSet::with_capacity(ids.len());
    let unique: Vec<InputId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
    let total = unique.len();
    let workers = options.workers.max(1);
    let start = Instant::now();

    tracing::info!(
        total,
        workers,
        layer = options.stop_layer.as_layer(),
        "Fetching {} ({} parallel workers)",
        options.stop_layer.noun(),
        workers
    );

    let mut result = FanOutResult {
        id_to_leaf: HashMap::with_capacity(total),
        errors: HashMap::new(),
    };

    let mut completions = stream::iter(unique)
        .map(move |id| async move {
            let outcome = lookup_one(client, id, options.stop_layer, options.task_timeout).await;
            (id, outcome)
        })
        .buffer_unordered(workers);

    let mut completed = 0usize;
    while let Some((id, outcome)) = completions.next().await {
        match outcome {
            LookupOutcome::Resolved(leaf) => {
                result.id_to_leaf.insert(id, leaf);
            }
            LookupOutcome::Failed(reason) => {
                tracing::debug!(id, reason = %reason, "Lookup failed");
                result.errors.insert(id, reason);
            }
        }

        completed += 1;
        if completed % PROGRESS_INTERVAL == 0 || completed == total {
            tracing::info!(
                "  {}/{} {} fetched ({:.1}s)",
                completed,
                total,
                options.stop_layer.noun(),
                start.elapsed().as_secs_f64()
            );
        }
    }

    tracing::info!(
        resolved = result.id_to_leaf.len(),
        errors = result.errors.len(),
        "Done: {} {} in {:.1}s ({} errors)",
        result.id_to_leaf.len(),
        options.stop_layer.noun(),
        start.elapsed().as_secs_f64(),
        result.errors.len()
    );

    result
}
