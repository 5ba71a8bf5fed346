//! Chunked graph service client
//!
//! [`ChunkedGraph`] is the seam between the pipelines and the remote service.
//! [`CaveClient`] talks to a real CAVE deployment over HTTP; tests substitute
//! an in-memory implementation.

mod cave;

pub use cave::CaveClient;

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Identifier returned by resolving a node through the hierarchy
pub type LeafId = u64;
/// Root identifier in the latest version of the hierarchy
pub type RootId = u64;

/// Chunked graph client errors
///
/// The `Display` text is what ends up in per-ID error reasons.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Client configuration error: {0}")]
    Config(String),
}

/// Hierarchy layer at which leaf resolution stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopLayer {
    /// Layer 1: supervoxels
    Supervoxel,
    /// Layer 2: L2 chunks
    L2Chunk,
}

impl StopLayer {
    pub fn as_layer(self) -> u8 {
        match self {
            StopLayer::Supervoxel => 1,
            StopLayer::L2Chunk => 2,
        }
    }

    /// Human-readable noun used in progress messages
    pub fn noun(self) -> &'static str {
        match self {
            StopLayer::Supervoxel => "supervoxels",
            StopLayer::L2Chunk => "L2 IDs",
        }
    }
}

/// Datastack metadata from the info service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatastackInfo {
    /// `graphene://{server}/segmentation/table/{table}`
    #[serde(default)]
    pub segmentation_source: String,
    /// Server hosting the L2 cache
    #[serde(default)]
    pub local_server: Option<String>,
    pub viewer_resolution_x: f64,
    pub viewer_resolution_y: f64,
    pub viewer_resolution_z: f64,
}

impl DatastackInfo {
    /// Nanometers per viewer voxel along x, y, z
    pub fn viewer_resolution(&self) -> [f64; 3] {
        [
            self.viewer_resolution_x,
            self.viewer_resolution_y,
            self.viewer_resolution_z,
        ]
    }
}

/// Cached attributes for one L2 chunk
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct L2Attributes {
    /// Representative coordinate in nanometers
    #[serde(default)]
    pub rep_coord_nm: Option<[f64; 3]>,
}

/// Remote operations consumed by the pipelines
///
/// Implementations are shared by every Stage A worker, so they must be safe
/// for concurrent use.
#[async_trait]
pub trait ChunkedGraph: Send + Sync {
    /// Descendants of `node` at `stop_layer`; an empty list is a valid answer
    async fn leaves(&self, node: u64, stop_layer: StopLayer) -> Result<Vec<LeafId>, ClientError>;

    /// Current root for each leaf, positionally aligned with `leaves`
    async fn current_roots(&self, leaves: &[LeafId]) -> Result<Vec<RootId>, ClientError>;

    /// Cached `rep_coord_nm` for each L2 chunk, keyed by the decimal ID text
    async fn rep_coords(
        &self,
        l2_ids: &[LeafId],
    ) -> Result<HashMap<String, L2Attributes>, ClientError>;

    /// Datastack metadata (viewer resolution)
    async fn datastack_info(&self) -> Result<DatastackInfo, ClientError>;
}
