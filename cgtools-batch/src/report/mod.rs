//! Stage C: report assembly
//!
//! Walks the original input sequence once, reading the Stage A and Stage B
//! maps, so every input ID (duplicates included) yields exactly one entry in
//! input order.

mod coordinates;
mod validation;

pub use coordinates::{nm_to_voxel, Coordinate, CoordinateEntry, CoordinateReport, TSV_HEADER};
pub use validation::{ValidationEntry, ValidationReport, LOOKUP_FAILED_REASON, RESULTS_MARKER};
