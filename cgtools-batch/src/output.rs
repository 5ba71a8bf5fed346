//! Report files and console summaries

use crate::pipeline::{CoordinateRun, ValidationRun};
use cgtools_common::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SUMMARY_RULE_WIDTH: usize = 60;

/// `<dir>/<stem><suffix>` beside `path`
fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("{}{}", stem, suffix))
}

/// `ids.txt` → `ids_updated.txt`
pub fn default_validation_output(input: &Path) -> PathBuf {
    sibling_with_suffix(input, "_updated.txt")
}

/// `ids.txt` → `ids_coords.tsv`
pub fn default_coords_output(input: &Path) -> PathBuf {
    sibling_with_suffix(input, "_coords.tsv")
}

/// `report.txt` → `report_clean.txt`
pub fn clean_ids_path(output: &Path) -> PathBuf {
    sibling_with_suffix(output, "_clean.txt")
}

/// Write the validation report and its clean-ID sibling
///
/// `elapsed` is the wall time for the header, measured by the caller from
/// before connecting. Returns the path of the clean-ID file.
pub fn write_validation(
    run: &ValidationRun,
    output: &Path,
    workers: usize,
    elapsed: Duration,
) -> Result<PathBuf> {
    std::fs::write(output, run.report.render(elapsed, workers))?;
    let clean = clean_ids_path(output);
    std::fs::write(&clean, run.report.render_clean_ids())?;
    tracing::debug!(report = %output.display(), clean = %clean.display(), "Wrote validation output");
    Ok(clean)
}

pub fn write_coordinates(run: &CoordinateRun, output: &Path) -> Result<()> {
    std::fs::write(output, run.report.render_tsv())?;
    tracing::debug!(output = %output.display(), "Wrote coordinate output");
    Ok(())
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

pub fn validation_summary(
    run: &ValidationRun,
    elapsed: Duration,
    output: &Path,
    clean: &Path,
) -> String {
    let report = &run.report;
    let total = report.total();
    let rule = "=".repeat(SUMMARY_RULE_WIDTH);
    [
        String::new(),
        rule.clone(),
        format!("VALIDATION COMPLETE - {:.1} seconds", elapsed.as_secs_f64()),
        rule,
        format!("Total IDs:  {}", total),
        format!(
            "Changed:    {} ({:.1}%)",
            report.changed_count(),
            percent(report.changed_count(), total)
        ),
        format!(
            "Unchanged:  {} ({:.1}%)",
            report.unchanged_count(),
            percent(report.unchanged_count(), total)
        ),
        format!("Errors:     {}", report.error_count()),
        format!("Report:     {}", output.display()),
        format!("Clean IDs:  {}", clean.display()),
    ]
    .join("\n")
}

pub fn coordinates_summary(run: &CoordinateRun, elapsed: Duration, output: &Path) -> String {
    let report = &run.report;
    let rule = "=".repeat(SUMMARY_RULE_WIDTH);
    [
        String::new(),
        rule.clone(),
        format!("COORDINATES COMPLETE - {:.1} seconds", elapsed.as_secs_f64()),
        rule,
        format!("Total IDs:    {}", report.total()),
        format!("Got coords:   {}", report.success_count()),
        format!("Failed:       {}", report.fail_count()),
        format!("Output:       {}", output.display()),
        String::new(),
        "Output is tab-separated - paste directly into a spreadsheet.".to_string(),
    ]
    .join("\n")
}
