//! Coordinate report (TSV)

use crate::batch::BatchOutcome;
use crate::fanout::{FanOutResult, LookupOutcome};
use cgtools_common::InputId;
use std::fmt;

pub const TSV_HEADER: &str = "root_id\tx\ty\tz";

/// Position in viewer voxel units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coordinate {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.x, self.y, self.z)
    }
}

/// Convert nanometers to viewer voxels, truncating toward zero
pub fn nm_to_voxel(raw_nm: [f64; 3], resolution: [f64; 3]) -> Coordinate {
    let axis = |i: usize| (raw_nm[i] / resolution[i]).trunc() as i64;
    Coordinate {
        x: axis(0),
        y: axis(1),
        z: axis(2),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinateEntry {
    Coords(Coordinate),
    /// Leaf resolved but no cached coordinate came back
    Unavailable,
    /// Stage A failed for this ID
    Error(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinateReport {
    pub entries: Vec<(InputId, CoordinateEntry)>,
}

impl CoordinateReport {
    pub fn assemble(
        ids: &[InputId],
        stage_a: &FanOutResult,
        coords: &BatchOutcome<[f64; 3]>,
        resolution: [f64; 3],
    ) -> Self {
        let entries = ids
            .iter()
            .map(|&id| {
                let entry = match stage_a.outcome(id) {
                    Some(LookupOutcome::Failed(reason)) => CoordinateEntry::Error(reason),
                    Some(LookupOutcome::Resolved(leaf)) => coords
                        .resolved
                        .get(&leaf)
                        .map(|raw| CoordinateEntry::Coords(nm_to_voxel(*raw, resolution)))
                        .unwrap_or(CoordinateEntry::Unavailable),
                    None => CoordinateEntry::Unavailable,
                };
                (id, entry)
            })
            .collect();
        Self { entries }
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn success_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, e)| matches!(e, CoordinateEntry::Coords(_)))
            .count()
    }

    pub fn fail_count(&self) -> usize {
        self.total() - self.success_count()
    }

    /// Tab-separated output with header, ready to paste into a spreadsheet
    pub fn render_tsv(&self) -> String {
        let mut lines = Vec::with_capacity(self.entries.len() + 1);
        lines.push(TSV_HEADER.to_string());
        for (id, entry) in &self.entries {
            lines.push(match entry {
                CoordinateEntry::Coords(coord) => format!("{}\t{}", id, coord),
                CoordinateEntry::Unavailable => format!("{}\tN/A\tN/A\tN/A", id),
                CoordinateEntry::Error(_) => format!("{}\tERROR\tERROR\tERROR", id),
            });
        }
        lines.join("\n")
    }
}
