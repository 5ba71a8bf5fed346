//! Test Helper Utilities
//!
//! Shared utilities for testing cgtools-batch

#![allow(dead_code)]

pub mod fake_cave;
pub mod stub_graph;

// Re-export commonly used items
pub use stub_graph::StubGraph;
