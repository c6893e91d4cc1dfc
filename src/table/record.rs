//! Experiment record: one cover row plus its execution outcome
//!
//! The record is the fixed-schema replacement for the loosely-typed row
//! dictionaries the original benchmark accumulated: warped-artifact presence
//! is an explicit `Option`, and the statistic columns are grouped per stage
//! instead of being scattered string keys.

use std::fmt;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::cover::{CoverRow, COVER_COLUMNS};
use crate::landmarks::{DistanceStats, STAT_NAMES};
use crate::{Error, Result};

/// Result column: unique experiment id
pub const COL_ID: &str = "ID";
/// Result column: per-id registration folder (experiment-root-relative)
pub const COL_REG_DIR: &str = "Registration folder";
/// Result column: wall-clock execution time
pub const COL_TIME: &str = "Execution time [minutes]";
/// Result column: reference image warped into the moving frame
pub const COL_IMAGE_REF_WARP: &str = "Warped reference image";
/// Result column: moving image warped into the reference frame
pub const COL_IMAGE_MOVE_WARP: &str = "Warped moving image";
/// Result column: reference landmarks warped into the moving frame
pub const COL_POINTS_REF_WARP: &str = "Warped reference landmarks";
/// Result column: moving landmarks warped into the reference frame
pub const COL_POINTS_MOVE_WARP: &str = "Warped moving landmarks";
/// Result column: reference-image diagonal used for rTRE normalization
pub const COL_IMAGE_DIAGONAL: &str = "Image diagonal [px]";

/// Alignment stage a statistic column refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Before any registration
    Init,
    /// After registration, on the warped landmarks
    Final,
}

impl Stage {
    /// Both stages in column order.
    pub const ALL: [Self; 2] = [Self::Init, Self::Final];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Final => write!(f, "final"),
        }
    }
}

/// Column name for a raw distance statistic, e.g. `TRE Mean (init)`.
#[must_use]
pub fn tre_column(name: &str, stage: Stage) -> String {
    format!("TRE {name} ({stage})")
}

/// Column name for a diagonal-normalized statistic, e.g. `rTRE Mean (final)`.
#[must_use]
pub fn rtre_column(name: &str, stage: Stage) -> String {
    format!("rTRE {name} ({stage})")
}

/// Distance statistics for one stage: raw TRE plus the rTRE variant when the
/// image diagonal was available.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageStats {
    /// Raw distances in pixels
    pub tre: DistanceStats,
    /// Distances divided by the reference-image diagonal
    pub rtre: Option<DistanceStats>,
}

/// Which frame the populated warped-landmark set lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarpDirection {
    /// Moving landmarks were warped into the reference frame; they are
    /// compared against the reference landmarks.
    MovingToReference,
    /// Reference landmarks were warped into the moving frame; they are
    /// compared against the moving landmarks.
    ReferenceToMoving,
}

/// One cover row augmented with its execution outcome.
///
/// Created when the row is first dispatched, filled in by the work-item
/// processor, and extended with statistic columns by the aggregator. Records
/// are only ever appended to across resumed runs, never deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentRecord {
    /// Stable cover-table position
    pub id: u64,
    /// The input pair this record executes
    pub cover: CoverRow,
    /// Registration folder, relative to the experiment root
    pub reg_dir: PathBuf,
    /// Wall-clock execution time in minutes
    pub time_minutes: Option<f64>,
    /// Reference image warped into the moving frame, if produced
    pub image_ref_warp: Option<PathBuf>,
    /// Moving image warped into the reference frame, if produced
    pub image_move_warp: Option<PathBuf>,
    /// Reference landmarks warped into the moving frame, if produced
    pub points_ref_warp: Option<PathBuf>,
    /// Moving landmarks warped into the reference frame, if produced
    pub points_move_warp: Option<PathBuf>,
    /// Reference-image diagonal in pixels
    pub image_diagonal: Option<f64>,
    /// Pre-registration alignment statistics
    pub init_stats: Option<StageStats>,
    /// Post-registration alignment statistics
    pub final_stats: Option<StageStats>,
}

impl ExperimentRecord {
    /// Fresh record for a dispatched cover row; the registration folder is
    /// the id itself.
    #[must_use]
    pub fn new(id: u64, cover: CoverRow) -> Self {
        Self {
            id,
            cover,
            reg_dir: PathBuf::from(id.to_string()),
            time_minutes: None,
            image_ref_warp: None,
            image_move_warp: None,
            points_ref_warp: None,
            points_move_warp: None,
            image_diagonal: None,
            init_stats: None,
            final_stats: None,
        }
    }

    /// The populated warped-landmark path and the frame it lives in.
    ///
    /// A well-formed record has at most one of the two fields set; if both
    /// are, the moving-to-reference warp wins, matching the order the
    /// original evaluation checked them in.
    #[must_use]
    pub fn warped_landmarks(&self) -> Option<(WarpDirection, &Path)> {
        if let Some(path) = &self.points_move_warp {
            return Some((WarpDirection::MovingToReference, path));
        }
        self.points_ref_warp
            .as_deref()
            .map(|path| (WarpDirection::ReferenceToMoving, path))
    }

    /// Stage statistics accessor by stage.
    #[must_use]
    pub const fn stage_stats(&self, stage: Stage) -> Option<&StageStats> {
        match stage {
            Stage::Init => self.init_stats.as_ref(),
            Stage::Final => self.final_stats.as_ref(),
        }
    }

    /// Set the statistics for a stage.
    pub fn set_stage_stats(&mut self, stage: Stage, stats: StageStats) {
        match stage {
            Stage::Init => self.init_stats = Some(stats),
            Stage::Final => self.final_stats = Some(stats),
        }
    }

    /// Every numeric column of this record, named as exported, `None` where
    /// the value is absent. The summary export folds these across records.
    #[must_use]
    pub fn numeric_columns(&self) -> Vec<(String, Option<f64>)> {
        let mut columns = vec![
            (COL_TIME.to_string(), self.time_minutes),
            (COL_IMAGE_DIAGONAL.to_string(), self.image_diagonal),
        ];
        for stage in Stage::ALL {
            let stats = self.stage_stats(stage);
            for name in STAT_NAMES {
                let tre = stats.map(|s| s.tre).and_then(|s| stat_by_name(&s, name));
                columns.push((tre_column(name, stage), tre));
                let rtre = stats
                    .and_then(|s| s.rtre)
                    .and_then(|s| stat_by_name(&s, name));
                columns.push((rtre_column(name, stage), rtre));
            }
        }
        columns
    }

    /// CSV header row for the result table, in export order.
    #[must_use]
    pub fn csv_headers() -> Vec<String> {
        let mut headers: Vec<String> = vec![COL_ID.to_string()];
        headers.extend(COVER_COLUMNS.iter().map(|c| (*c).to_string()));
        headers.extend(
            [
                COL_REG_DIR,
                COL_TIME,
                COL_IMAGE_REF_WARP,
                COL_IMAGE_MOVE_WARP,
                COL_POINTS_REF_WARP,
                COL_POINTS_MOVE_WARP,
                COL_IMAGE_DIAGONAL,
            ]
            .iter()
            .map(|c| (*c).to_string()),
        );
        for stage in Stage::ALL {
            for name in STAT_NAMES {
                headers.push(tre_column(name, stage));
            }
            for name in STAT_NAMES {
                headers.push(rtre_column(name, stage));
            }
        }
        headers
    }

    /// Field values matching [`Self::csv_headers`] order; absent values are
    /// empty strings.
    #[must_use]
    pub fn csv_fields(&self) -> Vec<String> {
        let mut fields = vec![
            self.id.to_string(),
            path_field(&self.cover.image_ref),
            path_field(&self.cover.image_move),
            path_field(&self.cover.points_ref),
            path_field(&self.cover.points_move),
            path_field(&self.reg_dir),
            float_field(self.time_minutes),
            opt_path_field(self.image_ref_warp.as_deref()),
            opt_path_field(self.image_move_warp.as_deref()),
            opt_path_field(self.points_ref_warp.as_deref()),
            opt_path_field(self.points_move_warp.as_deref()),
            float_field(self.image_diagonal),
        ];
        for stage in Stage::ALL {
            let stats = self.stage_stats(stage);
            for name in STAT_NAMES {
                fields.push(float_field(
                    stats.map(|s| s.tre).and_then(|s| stat_by_name(&s, name)),
                ));
            }
            for name in STAT_NAMES {
                fields.push(float_field(
                    stats
                        .and_then(|s| s.rtre)
                        .and_then(|s| stat_by_name(&s, name)),
                ));
            }
        }
        fields
    }

    /// Rebuild a record from a CSV row of a previously persisted table.
    ///
    /// `fallback_id` is the row's position, used when the `ID` column is
    /// absent (tables written before the id column was introduced index rows
    /// positionally).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Table`] when the id or a required cover path cannot
    /// be read; callers skip such rows with a warning instead of aborting.
    pub fn from_csv(
        index: &HeaderIndex,
        record: &csv::StringRecord,
        fallback_id: u64,
    ) -> Result<Self> {
        let id = match index.field(record, COL_ID) {
            Some(raw) if !raw.is_empty() => raw
                .parse::<u64>()
                .map_err(|_| Error::Table(format!("unparseable id {raw:?}")))?,
            _ => fallback_id,
        };

        let mut cover_paths: [Option<PathBuf>; 4] = [None, None, None, None];
        for (slot, col) in cover_paths.iter_mut().zip(COVER_COLUMNS) {
            let raw = index
                .field(record, col)
                .filter(|f| !f.is_empty())
                .ok_or_else(|| Error::Table(format!("row {id} is missing {col:?}")))?;
            *slot = Some(PathBuf::from(raw));
        }
        let [image_ref, image_move, points_ref, points_move] =
            cover_paths.map(|p| p.unwrap_or_default());

        let reg_dir = index
            .field(record, COL_REG_DIR)
            .filter(|f| !f.is_empty())
            .map_or_else(|| PathBuf::from(id.to_string()), PathBuf::from);

        let mut rebuilt = Self {
            id,
            cover: CoverRow {
                image_ref,
                image_move,
                points_ref,
                points_move,
            },
            reg_dir,
            time_minutes: index.float(record, COL_TIME),
            image_ref_warp: index.path(record, COL_IMAGE_REF_WARP),
            image_move_warp: index.path(record, COL_IMAGE_MOVE_WARP),
            points_ref_warp: index.path(record, COL_POINTS_REF_WARP),
            points_move_warp: index.path(record, COL_POINTS_MOVE_WARP),
            image_diagonal: index.float(record, COL_IMAGE_DIAGONAL),
            init_stats: None,
            final_stats: None,
        };
        for stage in Stage::ALL {
            if let Some(stats) = read_stage(index, record, stage) {
                rebuilt.set_stage_stats(stage, stats);
            }
        }
        Ok(rebuilt)
    }
}

/// Header-name to column-position lookup for one CSV file.
#[derive(Debug)]
pub struct HeaderIndex {
    positions: FxHashMap<String, usize>,
}

impl HeaderIndex {
    /// Index the header row of a result table.
    #[must_use]
    pub fn new(headers: &csv::StringRecord) -> Self {
        let positions = headers
            .iter()
            .enumerate()
            .map(|(pos, name)| (name.to_string(), pos))
            .collect();
        Self { positions }
    }

    /// Whether the table carries the given column at all.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    fn field<'r>(&self, record: &'r csv::StringRecord, name: &str) -> Option<&'r str> {
        self.positions.get(name).and_then(|&pos| record.get(pos))
    }

    fn float(&self, record: &csv::StringRecord, name: &str) -> Option<f64> {
        self.field(record, name)
            .filter(|f| !f.is_empty())
            .and_then(|f| f.parse().ok())
    }

    fn path(&self, record: &csv::StringRecord, name: &str) -> Option<PathBuf> {
        self.field(record, name)
            .filter(|f| !f.is_empty())
            .map(PathBuf::from)
    }
}

fn read_stage(
    index: &HeaderIndex,
    record: &csv::StringRecord,
    stage: Stage,
) -> Option<StageStats> {
    let tre = read_stats(record, stage, index, tre_column)?;
    let rtre = read_stats(record, stage, index, rtre_column);
    Some(StageStats { tre, rtre })
}

fn read_stats(
    record: &csv::StringRecord,
    stage: Stage,
    index: &HeaderIndex,
    column: fn(&str, Stage) -> String,
) -> Option<DistanceStats> {
    let mut values = [0.0_f64; 5];
    for (slot, name) in values.iter_mut().zip(STAT_NAMES) {
        *slot = index.float(record, &column(name, stage))?;
    }
    let [mean, std, median, min, max] = values;
    Some(DistanceStats {
        mean,
        std,
        median,
        min,
        max,
    })
}

fn stat_by_name(stats: &DistanceStats, name: &str) -> Option<f64> {
    stats
        .named()
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| *v)
}

fn path_field(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn opt_path_field(path: Option<&Path>) -> String {
    path.map(path_field).unwrap_or_default()
}

fn float_field(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cover() -> CoverRow {
        CoverRow {
            image_ref: PathBuf::from("imgs/ref.png"),
            image_move: PathBuf::from("imgs/move.png"),
            points_ref: PathBuf::from("lnds/ref.csv"),
            points_move: PathBuf::from("lnds/move.csv"),
        }
    }

    #[test]
    fn test_new_record_defaults() {
        let record = ExperimentRecord::new(7, sample_cover());
        assert_eq!(record.id, 7);
        assert_eq!(record.reg_dir, PathBuf::from("7"));
        assert!(record.time_minutes.is_none());
        assert!(record.warped_landmarks().is_none());
    }

    #[test]
    fn test_warped_landmarks_selection() {
        let mut record = ExperimentRecord::new(0, sample_cover());
        record.points_ref_warp = Some(PathBuf::from("0/move.csv"));
        let (direction, path) = record.warped_landmarks().unwrap();
        assert_eq!(direction, WarpDirection::ReferenceToMoving);
        assert_eq!(path, Path::new("0/move.csv"));

        // Moving-to-reference wins when both are present
        record.points_move_warp = Some(PathBuf::from("0/other.csv"));
        let (direction, _) = record.warped_landmarks().unwrap();
        assert_eq!(direction, WarpDirection::MovingToReference);
    }

    #[test]
    fn test_csv_headers_and_fields_align() {
        let record = ExperimentRecord::new(3, sample_cover());
        assert_eq!(ExperimentRecord::csv_headers().len(), record.csv_fields().len());
    }

    #[test]
    fn test_csv_roundtrip() {
        let mut record = ExperimentRecord::new(5, sample_cover());
        record.time_minutes = Some(0.125);
        record.image_move_warp = Some(PathBuf::from("5/ref.png"));
        record.points_ref_warp = Some(PathBuf::from("5/move.csv"));
        record.image_diagonal = Some(141.4213562373095);
        record.init_stats = Some(StageStats {
            tre: DistanceStats {
                mean: 1.0,
                std: 0.5,
                median: 0.75,
                min: 0.25,
                max: 2.0,
            },
            rtre: Some(DistanceStats {
                mean: 0.1,
                std: 0.05,
                median: 0.075,
                min: 0.025,
                max: 0.2,
            }),
        });

        let headers = csv::StringRecord::from(ExperimentRecord::csv_headers());
        let row = csv::StringRecord::from(record.csv_fields());
        let index = HeaderIndex::new(&headers);
        let rebuilt = ExperimentRecord::from_csv(&index, &row, 99).unwrap();

        assert_eq!(rebuilt, record);
    }

    #[test]
    fn test_from_csv_positional_fallback() {
        let headers = csv::StringRecord::from(vec![
            "Reference image",
            "Moving image",
            "Reference landmarks",
            "Moving landmarks",
        ]);
        let row = csv::StringRecord::from(vec!["a.png", "b.png", "a.csv", "b.csv"]);
        let index = HeaderIndex::new(&headers);
        let rebuilt = ExperimentRecord::from_csv(&index, &row, 4).unwrap();
        assert_eq!(rebuilt.id, 4);
        assert_eq!(rebuilt.reg_dir, PathBuf::from("4"));
    }

    #[test]
    fn test_from_csv_missing_cover_column() {
        let headers = csv::StringRecord::from(vec!["ID", "Reference image"]);
        let row = csv::StringRecord::from(vec!["1", "a.png"]);
        let index = HeaderIndex::new(&headers);
        let err = ExperimentRecord::from_csv(&index, &row, 1).unwrap_err();
        assert!(matches!(err, Error::Table(_)));
    }

    #[test]
    fn test_numeric_columns_cover_all_stats() {
        let record = ExperimentRecord::new(0, sample_cover());
        let columns = record.numeric_columns();
        // time + diagonal + 2 stages * 5 stats * (tre + rtre)
        assert_eq!(columns.len(), 2 + 2 * 5 * 2);
        assert!(columns.iter().all(|(_, v)| v.is_none()));
    }
}
