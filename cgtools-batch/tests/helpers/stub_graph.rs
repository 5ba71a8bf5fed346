//! Deterministic in-memory chunked graph
//!
//! Answers are fixed by the builder; only completion order varies (each
//! lookup sleeps a few milliseconds derived from its ID) so Stage A sees
//! out-of-order completions.

use async_trait::async_trait;
use cgtools_batch::client::{
    ChunkedGraph, ClientError, DatastackInfo, L2Attributes, LeafId, RootId, StopLayer,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct StubGraph {
    supervoxels: HashMap<u64, Vec<LeafId>>,
    l2_chunks: HashMap<u64, Vec<LeafId>>,
    roots: HashMap<LeafId, RootId>,
    coords: HashMap<LeafId, [f64; 3]>,
    faulty_nodes: HashMap<u64, String>,
    faulty_root_leaves: HashSet<LeafId>,
    short_root_leaves: HashSet<LeafId>,
    faulty_coord_leaves: HashSet<LeafId>,
    resolution: [f64; 3],
    jitter: bool,

    pub leaf_calls: AtomicUsize,
    pub root_calls: AtomicUsize,
    pub coord_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl StubGraph {
    pub fn new() -> Self {
        Self {
            resolution: [4.0, 4.0, 40.0],
            jitter: true,
            ..Default::default()
        }
    }

    /// `node` has supervoxel `leaf` whose current root is `root`
    pub fn with_supervoxel(mut self, node: u64, leaf: LeafId, root: RootId) -> Self {
        self.supervoxels.entry(node).or_default().push(leaf);
        self.roots.insert(leaf, root);
        self
    }

    /// `node` resolves to an empty leaf list at every layer
    pub fn with_no_leaves(mut self, node: u64) -> Self {
        self.supervoxels.insert(node, Vec::new());
        self.l2_chunks.insert(node, Vec::new());
        self
    }

    /// `node` has L2 chunk `leaf`, optionally with a cached coordinate
    pub fn with_l2(mut self, node: u64, leaf: LeafId, coord_nm: Option<[f64; 3]>) -> Self {
        self.l2_chunks.entry(node).or_default().push(leaf);
        if let Some(coord) = coord_nm {
            self.coords.insert(leaf, coord);
        }
        self
    }

    /// Leaf lookups for `node` raise `message`
    pub fn with_faulty_node(mut self, node: u64, message: &str) -> Self {
        self.faulty_nodes.insert(node, message.to_string());
        self
    }

    /// Any root batch containing `leaf` fails
    pub fn with_faulty_root_leaf(mut self, leaf: LeafId) -> Self {
        self.faulty_root_leaves.insert(leaf);
        self
    }

    /// Any root batch containing `leaf` answers with one root too few
    pub fn with_short_root_batch(mut self, leaf: LeafId) -> Self {
        self.short_root_leaves.insert(leaf);
        self
    }

    /// Any L2 cache batch containing `leaf` fails
    pub fn with_faulty_coord_leaf(mut self, leaf: LeafId) -> Self {
        self.faulty_coord_leaves.insert(leaf);
        self
    }

    pub fn with_resolution(mut self, resolution: [f64; 3]) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    fn record_in_flight(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChunkedGraph for StubGraph {
    async fn leaves(&self, node: u64, stop_layer: StopLayer) -> Result<Vec<LeafId>, ClientError> {
        self.leaf_calls.fetch_add(1, Ordering::SeqCst);
        self.record_in_flight();
        if self.jitter {
            tokio::time::sleep(Duration::from_millis(node % 7)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(message) = self.faulty_nodes.get(&node) {
            return Err(ClientError::Network(message.clone()));
        }
        let table = match stop_layer {
            StopLayer::Supervoxel => &self.supervoxels,
            StopLayer::L2Chunk => &self.l2_chunks,
        };
        table
            .get(&node)
            .cloned()
            .ok_or_else(|| ClientError::Api(400, format!("node {} not in graph", node)))
    }

    async fn current_roots(&self, leaves: &[LeafId]) -> Result<Vec<RootId>, ClientError> {
        self.root_calls.fetch_add(1, Ordering::SeqCst);
        if leaves.iter().any(|l| self.faulty_root_leaves.contains(l)) {
            return Err(ClientError::Api(500, "Internal Server Error".to_string()));
        }
        let mut roots: Vec<RootId> = leaves
            .iter()
            .map(|l| self.roots.get(l).copied().unwrap_or(0))
            .collect();
        if leaves.iter().any(|l| self.short_root_leaves.contains(l)) {
            roots.pop();
        }
        Ok(roots)
    }

    async fn rep_coords(
        &self,
        l2_ids: &[LeafId],
    ) -> Result<HashMap<String, L2Attributes>, ClientError> {
        self.coord_calls.fetch_add(1, Ordering::SeqCst);
        if l2_ids.iter().any(|l| self.faulty_coord_leaves.contains(l)) {
            return Err(ClientError::Api(504, "Gateway Timeout".to_string()));
        }
        Ok(l2_ids
            .iter()
            .map(|l| {
                (
                    l.to_string(),
                    L2Attributes {
                        rep_coord_nm: self.coords.get(l).copied(),
                    },
                )
            })
            .collect())
    }

    async fn datastack_info(&self) -> Result<DatastackInfo, ClientError> {
        Ok(DatastackInfo {
            segmentation_source: "graphene://https://stub/segmentation/table/stub".to_string(),
            local_server: None,
            viewer_resolution_x: self.resolution[0],
            viewer_resolution_y: self.resolution[1],
            viewer_resolution_z: self.resolution[2],
        })
    }
}
