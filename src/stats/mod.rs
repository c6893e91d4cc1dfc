//! Statistics aggregation and summary export
//!
//! Folds landmark-alignment error statistics into each completed record
//! (`init` before any warp, `final` after) and exports descriptive
//! statistics across all records as a CSV table plus a plain-text report
//! that restates the run configuration. Aggregation is always sequential:
//! it mutates the single shared table.

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::{RunConfig, RunPaths};
use crate::landmarks::{load_landmarks, percentile, DistanceStats, Point};
use crate::table::{ExperimentRecord, ResultTable, Stage, StageStats, WarpDirection};
use crate::{Error, Result};

/// File name of the summary statistics table inside the experiment root.
pub const SUMMARY_CSV_FILE: &str = "results-summary.csv";
/// File name of the plain-text summary report inside the experiment root.
pub const SUMMARY_TXT_FILE: &str = "results-summary.txt";

/// Fold `init`/`final` distance statistics into every record of the table.
///
/// Per-record failures (unreadable or mismatched landmark files, missing
/// warped output, empty point sets) are logged and skipped; aggregation
/// continues for the remaining records.
pub fn summarize(table: &mut ResultTable, paths: &RunPaths) {
    for record in table.records_sorted_mut() {
        if let Err(err) = fold_record(record, paths) {
            tracing::warn!(id = record.id, %err, "record statistics incomplete");
        }
    }
}

/// Compute both stages for one record.
///
/// The `final` comparison always pairs landmark sets expected to coincide
/// after correct registration: moving landmarks warped into the reference
/// frame compare against the reference set, warped reference landmarks
/// against the moving set.
fn fold_record(record: &mut ExperimentRecord, paths: &RunPaths) -> Result<()> {
    let points_ref = load_landmarks(&paths.resolve_data(&record.cover.points_ref))?;
    let points_move = load_landmarks(&paths.resolve_data(&record.cover.points_move))?;
    if points_ref.is_empty() || points_move.is_empty() {
        return Err(Error::Other("empty landmark set".to_string()));
    }

    record.image_diagonal = image_diagonal(&paths.resolve_data(&record.cover.image_ref));
    let diagonal = record.image_diagonal;

    if let Some(init) = DistanceStats::between(&points_ref, &points_move)? {
        record.set_stage_stats(Stage::Init, with_normalization(init, diagonal));
    }

    let (direction, warped_rel) = record
        .warped_landmarks()
        .map(|(direction, path)| (direction, path.to_path_buf()))
        .ok_or_else(|| Error::Other("no warped landmark output".to_string()))?;
    let warped = load_landmarks(&paths.resolve_expt(&warped_rel))?;
    let target: &[Point] = match direction {
        WarpDirection::MovingToReference => &points_ref,
        WarpDirection::ReferenceToMoving => &points_move,
    };
    if let Some(finals) = DistanceStats::between(&warped, target)? {
        record.set_stage_stats(Stage::Final, with_normalization(finals, diagonal));
    }
    Ok(())
}

fn with_normalization(tre: DistanceStats, diagonal: Option<f64>) -> StageStats {
    StageStats {
        tre,
        rtre: diagonal.map(|d| tre.normalized_by(d)),
    }
}

/// Diagonal of the image in pixels, from a header-only dimension probe.
///
/// Unreadable images leave the record without rTRE columns rather than
/// failing its statistics.
fn image_diagonal(path: &Path) -> Option<f64> {
    match image::image_dimensions(path) {
        Ok((width, height)) => Some(f64::from(width).hypot(f64::from(height))),
        Err(err) => {
            tracing::debug!(path = %path.display(), %err, "image diagonal unavailable");
            None
        }
    }
}

/// Descriptive statistics for one numeric column across all records.
#[derive(Debug, Clone)]
pub struct ColumnSummary {
    /// Column name as exported in the result table
    pub column: String,
    /// Number of records carrying a value
    pub count: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Sample standard deviation; absent with fewer than two values
    pub std: Option<f64>,
    /// Median (linear interpolation)
    pub median: f64,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// One value per configured percentile, in configuration order
    pub percentiles: Vec<f64>,
}

impl ColumnSummary {
    /// Summary over a non-empty value sample.
    fn compute(column: &str, values: &[f64], percentiles: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        #[allow(clippy::cast_precision_loss)]
        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let std = (sorted.len() >= 2).then(|| {
            (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        });
        Self {
            column: column.to_string(),
            count: sorted.len(),
            mean,
            std,
            median: percentile(&sorted, 50.0),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            percentiles: percentiles.iter().map(|p| percentile(&sorted, *p)).collect(),
        }
    }
}

/// Export descriptive statistics across all records for every numeric
/// column, sorted by column name, as `results-summary.csv` plus a
/// `results-summary.txt` report restating the run configuration.
///
/// An empty table is a reportable error: it is logged and no files are
/// written.
///
/// # Errors
///
/// Returns [`Error::Io`] or [`Error::Csv`] when the summary files cannot be
/// written.
pub fn export_summary(table: &ResultTable, out_dir: &Path, config: &RunConfig) -> Result<()> {
    if table.is_empty() {
        tracing::error!("no experiments completed, skipping summary export");
        return Ok(());
    }

    let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for record in table.records_sorted() {
        for (name, value) in record.numeric_columns() {
            if let Some(value) = value {
                columns.entry(name).or_default().push(value);
            }
        }
    }
    let summaries: Vec<ColumnSummary> = columns
        .iter()
        .map(|(name, values)| ColumnSummary::compute(name, values, &config.percentiles))
        .collect();

    let csv_path = out_dir.join(SUMMARY_CSV_FILE);
    write_summary_csv(&csv_path, &summaries, &config.percentiles)?;
    let txt_path = out_dir.join(SUMMARY_TXT_FILE);
    write_summary_report(&txt_path, &summaries, &config.percentiles, config)?;

    tracing::info!(
        records = table.len(),
        columns = summaries.len(),
        csv = %csv_path.display(),
        report = %txt_path.display(),
        "-> summary exported"
    );
    Ok(())
}

fn summary_headers(percentiles: &[f64]) -> Vec<String> {
    let mut headers: Vec<String> = ["Column", "Count", "Mean", "STD", "Median", "Min", "Max"]
        .iter()
        .map(|h| (*h).to_string())
        .collect();
    headers.extend(percentiles.iter().map(|p| format!("{p}%")));
    headers
}

fn summary_fields(summary: &ColumnSummary) -> Vec<String> {
    let mut fields = vec![
        summary.column.clone(),
        summary.count.to_string(),
        summary.mean.to_string(),
        summary.std.map(|s| s.to_string()).unwrap_or_default(),
        summary.median.to_string(),
        summary.min.to_string(),
        summary.max.to_string(),
    ];
    fields.extend(summary.percentiles.iter().map(ToString::to_string));
    fields
}

fn write_summary_csv(path: &Path, summaries: &[ColumnSummary], percentiles: &[f64]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(summary_headers(percentiles))?;
    for summary in summaries {
        writer.write_record(summary_fields(summary))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_summary_report(
    path: &Path,
    summaries: &[ColumnSummary],
    percentiles: &[f64],
    config: &RunConfig,
) -> Result<()> {
    let config_echo =
        serde_json::to_string_pretty(config).map_err(|err| Error::Other(err.to_string()))?;

    let name_width = summaries
        .iter()
        .map(|s| s.column.len())
        .max()
        .unwrap_or(0)
        .max("Column".len());

    let mut report = String::new();
    report.push_str(&format!(
        "Image-registration benchmark summary ({})\n\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str("CONFIGURATION:\n");
    report.push_str(&config_echo);
    report.push_str("\n\nRESULTS:\n");

    report.push_str(&format!("{:<name_width$}", "Column"));
    for header in summary_headers(percentiles).into_iter().skip(1) {
        report.push_str(&format!("  {header:>12}"));
    }
    report.push('\n');
    for summary in summaries {
        report.push_str(&format!("{:<name_width$}", summary.column));
        for field in summary_fields(summary).into_iter().skip(1) {
            let rounded = field
                .parse::<f64>()
                .map_or(field, |v| format!("{v:.6}"));
            report.push_str(&format!("  {rounded:>12}"));
        }
        report.push('\n');
    }

    std::fs::write(path, report)?;
    Ok(())
}
