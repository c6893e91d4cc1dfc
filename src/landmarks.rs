//! Landmark point sets and distance statistics
//!
//! Landmarks are labeled 2D points used as correspondence references between
//! an image pair. Correspondence is positional: point `i` in one set matches
//! point `i` in the other. The distance statistics computed here are the TRE
//! (target registration error) aggregates attached to each experiment record,
//! with an rTRE variant normalized by the reference-image diagonal.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Statistic names in the order they appear as table columns.
pub const STAT_NAMES: [&str; 5] = ["Mean", "STD", "Median", "Min", "Max"];

/// A 2D landmark in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate in pixels
    pub x: f64,
    /// Vertical coordinate in pixels
    pub y: f64,
}

impl Point {
    /// Create a point from its coordinates.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Load a landmark set from a delimited file.
///
/// Accepts the two layouts found in the wild: plain `x,y` rows, and an
/// indexed table with a header row (`,X,Y` then `0,x,y` per row). The last
/// two fields of every record are taken as the coordinates; a leading
/// non-numeric row is treated as the header and skipped.
///
/// # Errors
///
/// Returns [`Error::Landmarks`] when the file cannot be read, a data row has
/// fewer than two fields, or a coordinate fails to parse.
pub fn load_landmarks(path: &Path) -> Result<Vec<Point>> {
    let malformed = |reason: String| Error::Landmarks {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| malformed(e.to_string()))?;

    let mut points = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| malformed(e.to_string()))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        if record.len() < 2 {
            return Err(malformed(format!("row {row} has fewer than two fields")));
        }
        let x_raw = &record[record.len() - 2];
        let y_raw = &record[record.len() - 1];
        match (x_raw.parse::<f64>(), y_raw.parse::<f64>()) {
            (Ok(x), Ok(y)) => points.push(Point::new(x, y)),
            // First row may be a header such as ",X,Y"
            _ if row == 0 => {}
            _ => {
                return Err(malformed(format!(
                    "row {row} has non-numeric coordinates: {x_raw:?}, {y_raw:?}"
                )))
            }
        }
    }
    Ok(points)
}

/// Per-point Euclidean distances between two positionally-corresponding sets.
///
/// # Errors
///
/// Returns [`Error::PointCountMismatch`] when the sets differ in length;
/// correspondence is positional, so truncation would silently compare the
/// wrong pairs.
pub fn pairwise_distances(left: &[Point], right: &[Point]) -> Result<Vec<f64>> {
    if left.len() != right.len() {
        return Err(Error::PointCountMismatch {
            left: left.len(),
            right: right.len(),
        });
    }
    Ok(left
        .iter()
        .zip(right.iter())
        .map(|(a, b)| a.distance_to(b))
        .collect())
}

/// Aggregate distance statistics over one point-set comparison.
///
/// `std` is the population standard deviation; the cross-record summary in
/// [`crate::stats`] uses the sample variant instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceStats {
    /// Arithmetic mean distance
    pub mean: f64,
    /// Population standard deviation of the distances
    pub std: f64,
    /// Median distance (linear interpolation)
    pub median: f64,
    /// Smallest distance
    pub min: f64,
    /// Largest distance
    pub max: f64,
}

impl DistanceStats {
    /// Compute the statistics over a non-empty distance sample.
    ///
    /// Returns `None` for an empty sample; an empty point set contributes no
    /// statistics rather than propagating NaN into the table.
    #[must_use]
    pub fn from_distances(distances: &[f64]) -> Option<Self> {
        if distances.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = distances.len() as f64;
        let mean = distances.iter().sum::<f64>() / n;
        let variance = distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;

        let mut sorted = distances.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        Some(Self {
            mean,
            std: variance.sqrt(),
            median: percentile(&sorted, 50.0),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        })
    }

    /// Statistics between two corresponding point sets.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::PointCountMismatch`] from the distance computation.
    pub fn between(left: &[Point], right: &[Point]) -> Result<Option<Self>> {
        let distances = pairwise_distances(left, right)?;
        Ok(Self::from_distances(&distances))
    }

    /// Divide every statistic by `diagonal`, producing the rTRE variant.
    #[must_use]
    pub fn normalized_by(&self, diagonal: f64) -> Self {
        Self {
            mean: self.mean / diagonal,
            std: self.std / diagonal,
            median: self.median / diagonal,
            min: self.min / diagonal,
            max: self.max / diagonal,
        }
    }

    /// The statistics paired with their column names, in [`STAT_NAMES`] order.
    #[must_use]
    pub fn named(&self) -> [(&'static str, f64); 5] {
        [
            ("Mean", self.mean),
            ("STD", self.std),
            ("Median", self.median),
            ("Min", self.min),
            ("Max", self.max),
        ]
    }
}

/// Linear-interpolation percentile over an ascending-sorted slice.
///
/// Matches the interpolation the original summary tooling used, so median =
/// `percentile(sorted, 50.0)` and quartiles line up with prior reports.
/// Returns NaN for an empty slice; callers guard for emptiness first.
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    #[allow(clippy::cast_precision_loss)]
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let weight = rank - rank.floor();
    sorted[lo].mul_add(1.0 - weight, sorted[hi] * weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_distance_unit_offset() {
        let reference = [Point::new(0.0, 0.0), Point::new(10.0, 0.0)];
        let moving = [Point::new(0.0, 1.0), Point::new(10.0, 1.0)];
        let stats = DistanceStats::between(&reference, &moving).unwrap().unwrap();

        assert!((stats.mean - 1.0).abs() < 1e-12);
        assert!((stats.median - 1.0).abs() < 1e-12);
        assert!((stats.min - 1.0).abs() < 1e-12);
        assert!((stats.max - 1.0).abs() < 1e-12);
        assert!(stats.std.abs() < 1e-12);

        // 100x100 image diagonal
        let diagonal = 2.0_f64.sqrt() * 100.0;
        let normalized = stats.normalized_by(diagonal);
        assert!((normalized.mean - 0.007_071).abs() < 1e-5);
    }

    #[test]
    fn test_mean_is_arithmetic_mean() {
        let distances = [3.0, 4.0, 5.0, 0.0];
        let stats = DistanceStats::from_distances(&distances).unwrap();
        assert!((stats.mean - 3.0).abs() < 1e-12);
        assert!((stats.min - 0.0).abs() < 1e-12);
        assert!((stats.max - 5.0).abs() < 1e-12);
        // median of [0,3,4,5] = (3+4)/2
        assert!((stats.median - 3.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_sample_has_no_stats() {
        assert!(DistanceStats::from_distances(&[]).is_none());
        assert!(DistanceStats::between(&[], &[]).unwrap().is_none());
    }

    #[test]
    fn test_mismatched_lengths_error() {
        let left = [Point::new(0.0, 0.0)];
        let right = [Point::new(0.0, 0.0), Point::new(1.0, 1.0)];
        let err = pairwise_distances(&left, &right).unwrap_err();
        assert!(matches!(
            err,
            Error::PointCountMismatch { left: 1, right: 2 }
        ));
    }

    #[test]
    fn test_percentile_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&sorted, 0.0) - 1.0).abs() < 1e-12);
        assert!((percentile(&sorted, 100.0) - 4.0).abs() < 1e-12);
        assert!((percentile(&sorted, 50.0) - 2.5).abs() < 1e-12);
        assert!((percentile(&sorted, 25.0) - 1.75).abs() < 1e-12);
    }

    #[test]
    fn test_load_plain_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "plain.csv", "0.5,1.5\n2.0,3.0\n");
        let points = load_landmarks(&path).unwrap();
        assert_eq!(points.len(), 2);
        assert!((points[0].x - 0.5).abs() < 1e-12);
        assert!((points[1].y - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_load_indexed_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "indexed.csv", ",X,Y\n0,189.25,256.5\n1,12.0,13.0\n");
        let points = load_landmarks(&path).unwrap();
        assert_eq!(points.len(), 2);
        assert!((points[0].x - 189.25).abs() < 1e-12);
        assert!((points[0].y - 256.5).abs() < 1e-12);
    }

    #[test]
    fn test_load_rejects_garbage_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "bad.csv", "0.5,1.5\nnot,numbers\n");
        let err = load_landmarks(&path).unwrap_err();
        assert!(matches!(err, Error::Landmarks { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_landmarks(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, Error::Landmarks { .. }));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: mean lies within [min, max]
            #[test]
            fn prop_mean_bounded(distances in prop::collection::vec(0.0..1e6_f64, 1..256)) {
                let stats = DistanceStats::from_distances(&distances).unwrap();
                prop_assert!(stats.mean >= stats.min - 1e-9);
                prop_assert!(stats.mean <= stats.max + 1e-9);
            }

            /// Property: normalization divides every aggregate by the diagonal
            #[test]
            fn prop_normalization_scales_linearly(
                distances in prop::collection::vec(0.0..1e4_f64, 1..64),
                diagonal in 1.0..1e4_f64,
            ) {
                let stats = DistanceStats::from_distances(&distances).unwrap();
                let scaled = stats.normalized_by(diagonal);
                prop_assert!((scaled.mean * diagonal - stats.mean).abs() < 1e-6);
                prop_assert!((scaled.median * diagonal - stats.median).abs() < 1e-6);
                prop_assert!((scaled.max * diagonal - stats.max).abs() < 1e-6);
            }

            /// Property: percentile is monotone in p
            #[test]
            fn prop_percentile_monotone(
                mut values in prop::collection::vec(0.0..1e6_f64, 2..128),
                p_lo in 0.0..100.0_f64,
                p_hi in 0.0..100.0_f64,
            ) {
                values.sort_by(|a, b| a.partial_cmp(b).unwrap());
                let (lo, hi) = if p_lo <= p_hi { (p_lo, p_hi) } else { (p_hi, p_lo) };
                prop_assert!(percentile(&values, lo) <= percentile(&values, hi) + 1e-9);
            }
        }
    }
}
