//! Stage B: batched resolution of collected leaves
//!
//! Leaves are split into contiguous chunks and each chunk is one remote call.
//! A fault on one chunk is isolated: its leaves are recorded as failed and the
//! remaining chunks still run.

use crate::client::{ChunkedGraph, ClientError, LeafId, RootId};
use std::collections::HashMap;
use std::future::Future;
use std::time::Instant;

/// Root lookups per request
pub const ROOTS_CHUNK_SIZE: usize = 5000;
/// L2 cache lookups per request; larger batches hit gateway timeouts
pub const L2_CACHE_CHUNK_SIZE: usize = 100;

/// Stage B output
///
/// A leaf is in `resolved`, in `failed`, or in neither (its chunk succeeded
/// but the service had nothing for it).
#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    pub resolved: HashMap<LeafId, T>,
    /// Leaf → reason, for leaves whose chunk failed
    pub failed: HashMap<LeafId, String>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            resolved: HashMap::new(),
            failed: HashMap::new(),
        }
    }
}

/// Drive `call` over `leaves` in chunks of `chunk_size`
///
/// `call` returns the (leaf, value) pairs for one chunk.
async fn run_chunked<'a, T, F, Fut>(
    leaves: &'a [LeafId],
    chunk_size: usize,
    label: &str,
    mut call: F,
) -> BatchOutcome<T>
where
    F: FnMut(&'a [LeafId]) -> Fut,
    Fut: Future<Output = Result<Vec<(LeafId, T)>, ClientError>>,
{
    let mut outcome = BatchOutcome::default();
    let start = Instant::now();
    let total = leaves.len();
    let mut done = 0usize;

    for (index, chunk) in leaves.chunks(chunk_size.max(1)).enumerate() {
        let first = index * chunk_size.max(1);
        match call(chunk).await {
            Ok(pairs) => outcome.resolved.extend(pairs),
            Err(e) => {
                tracing::warn!(
                    "{} chunk {}-{} failed: {}",
                    label,
                    first,
                    first + chunk.len(),
                    e
                );
                let reason = e.to_string();
                outcome
                    .failed
                    .extend(chunk.iter().map(|leaf| (*leaf, reason.clone())));
            }
        }

        let previous = done;
        done += chunk.len();
        if done / 500 > previous / 500 || done == total {
            tracing::info!(
                "  {}/{} {} done ({:.1}s)",
                done,
                total,
                label,
                start.elapsed().as_secs_f64()
            );
        }
    }

    tracing::info!(
        resolved = outcome.resolved.len(),
        failed = outcome.failed.len(),
        "{} done in {:.1}s",
        label,
        start.elapsed().as_secs_f64()
    );
    outcome
}

/// Resolve leaves to their current roots, `chunk_size` leaves per request
pub async fn resolve_current_roots<C>(
    client: &C,
    leaves: &[LeafId],
    chunk_size: usize,
) -> BatchOutcome<RootId>
where
    C: ChunkedGraph + ?Sized,
{
    run_chunked(leaves, chunk_size, "root lookups", move |chunk| {
        roots_for_chunk(client, chunk)
    })
    .await
}

async fn roots_for_chunk<C>(
    client: &C,
    chunk: &[LeafId],
) -> Result<Vec<(LeafId, RootId)>, ClientError>
where
    C: ChunkedGraph + ?Sized,
{
    let roots = client.current_roots(chunk).await?;
    if roots.len() != chunk.len() {
        return Err(ClientError::Parse(format!(
            "expected {} roots, got {}",
            chunk.len(),
            roots.len()
        )));
    }
    Ok(chunk.iter().copied().zip(roots).collect())
}

/// Fetch cached representative coordinates (nanometers) for L2 chunks
///
/// Chunks whose cache entry lacks `rep_coord_nm` are simply absent from
/// `resolved`.
pub async fn fetch_rep_coords<C>(
    client: &C,
    leaves: &[LeafId],
    chunk_size: usize,
) -> BatchOutcome<[f64; 3]>
where
    C: ChunkedGraph + ?Sized,
{
    run_chunked(leaves, chunk_size, "L2 coords", move |chunk| {
        coords_for_chunk(client, chunk)
    })
    .await
}

async fn coords_for_chunk<C>(
    client: &C,
    chunk: &[LeafId],
) -> Result<Vec<(LeafId, [f64; 3])>, ClientError>
where
    C: ChunkedGraph + ?Sized,
{
    let data = client.rep_coords(chunk).await?;
    Ok(chunk
        .iter()
        .filter_map(|leaf| {
            data.get(&leaf.to_string())
                .and_then(|attrs| attrs.rep_coord_nm)
                .map(|coord| (*leaf, coord))
        })
        .collect())
}
