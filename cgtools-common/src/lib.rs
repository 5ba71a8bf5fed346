//! # cgtools Common Library
//!
//! Shared code for the chunked-graph batch tools including:
//! - Error types
//! - Configuration loading (TOML, environment, auth token)
//! - Input ID parsing

pub mod config;
pub mod error;
pub mod ids;

pub use error::{Error, Result};
pub use ids::InputId;
