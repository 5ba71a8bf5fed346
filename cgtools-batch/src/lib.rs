//! cgtools-batch library interface
//!
//! Bulk root-ID validation and coordinate lookup against a CAVE chunked
//! graph. Both tools share one shape:
//!
//! - **Stage A** ([`fanout`]): one leaf lookup per input ID, bounded concurrency
//! - **Stage B** ([`batch`]): chunked bulk resolution of the collected leaves
//! - **Stage C** ([`report`]): per-ID results in original input order

pub mod batch;
pub mod cli;
pub mod client;
pub mod fanout;
pub mod output;
pub mod pipeline;
pub mod report;

pub use crate::client::{CaveClient, ChunkedGraph, ClientError, StopLayer};
pub use crate::pipeline::{run_coordinates, run_validation, PipelineOptions};
