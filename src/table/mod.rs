//! Result table: the single source of truth for "what has run"
//!
//! An ordered collection of [`ExperimentRecord`]s keyed by unique experiment
//! id, persisted to one CSV file after every completed unit and reloaded at
//! startup so interrupted runs resume where they stopped. The completion
//! check pairs table membership with a folder-existence probe: a folder
//! without a table entry is an interrupted, retryable run.

pub mod record;

use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::Result;

pub use record::{
    rtre_column, tre_column, ExperimentRecord, HeaderIndex, Stage, StageStats, WarpDirection,
    COL_ID, COL_IMAGE_DIAGONAL, COL_IMAGE_MOVE_WARP, COL_IMAGE_REF_WARP, COL_POINTS_MOVE_WARP,
    COL_POINTS_REF_WARP, COL_REG_DIR, COL_TIME,
};

/// File name of the persisted result table inside the experiment root.
pub const RESULTS_FILE: &str = "registration-results.csv";

/// Ordered table of experiment records keyed by unique id.
#[derive(Debug, Default)]
pub struct ResultTable {
    records: FxHashMap<u64, ExperimentRecord>,
}

impl ResultTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a previously persisted table.
    ///
    /// Fails softly: a missing file yields an empty table, and rows that do
    /// not parse are skipped with a warning instead of aborting the resume.
    /// When the `ID` column is present it is the unique key; otherwise rows
    /// take their positional index.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let mut table = Self::new();
        if !path.is_file() {
            return table;
        }
        let mut reader = match csv::Reader::from_path(path) {
            Ok(reader) => reader,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "result table unreadable, starting empty");
                return table;
            }
        };
        let index = match reader.headers() {
            Ok(headers) => HeaderIndex::new(headers),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "result table has no header row");
                return table;
            }
        };
        for (position, row) in (0_u64..).zip(reader.records()) {
            let parsed = row
                .map_err(crate::Error::from)
                .and_then(|row| ExperimentRecord::from_csv(&index, &row, position));
            match parsed {
                Ok(record) => table.append(record),
                Err(err) => {
                    tracing::warn!(position, %err, "skipping unparseable result row");
                }
            }
        }
        tracing::info!(
            path = %path.display(),
            records = table.len(),
            "-> reloaded result table"
        );
        table
    }

    /// Add or replace the record for its id.
    pub fn append(&mut self, record: ExperimentRecord) {
        self.records.insert(record.id, record);
    }

    /// Write the whole table out, sorted by id.
    ///
    /// Uses a temp-file-then-rename so a crash mid-write cannot corrupt the
    /// previously persisted table. Called after every completed unit; a crash
    /// therefore loses at most the in-flight units.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] or [`crate::Error::Csv`] when the file
    /// cannot be written or renamed into place.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            writer.write_record(ExperimentRecord::csv_headers())?;
            for record in self.records_sorted() {
                writer.write_record(record.csv_fields())?;
            }
            writer.flush()?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Completion check for one unit: the output directory exists on disk
    /// AND the id is present in the table.
    #[must_use]
    pub fn is_complete(&self, id: u64, output_dir: &Path) -> bool {
        output_dir.is_dir() && self.records.contains_key(&id)
    }

    /// Whether the table holds a record for `id`.
    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.records.contains_key(&id)
    }

    /// Record by id.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&ExperimentRecord> {
        self.records.get(&id)
    }

    /// Snapshot of every id currently in the table.
    ///
    /// Taken once before dispatch so workers can test membership without
    /// touching the shared table.
    #[must_use]
    pub fn ids(&self) -> FxHashSet<u64> {
        self.records.keys().copied().collect()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in ascending id order.
    #[must_use]
    pub fn records_sorted(&self) -> Vec<&ExperimentRecord> {
        let mut records: Vec<&ExperimentRecord> = self.records.values().collect();
        records.sort_by_key(|r| r.id);
        records
    }

    /// Mutable iteration for the aggregation phase, ascending id order.
    pub fn records_sorted_mut(&mut self) -> Vec<&mut ExperimentRecord> {
        let mut records: Vec<&mut ExperimentRecord> = self.records.values_mut().collect();
        records.sort_by_key(|r| r.id);
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cover::CoverRow;
    use std::path::PathBuf;

    fn sample_record(id: u64) -> ExperimentRecord {
        ExperimentRecord::new(
            id,
            CoverRow {
                image_ref: PathBuf::from("imgs/ref.png"),
                image_move: PathBuf::from("imgs/move.png"),
                points_ref: PathBuf::from("lnds/ref.csv"),
                points_move: PathBuf::from("lnds/move.csv"),
            },
        )
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let table = ResultTable::load(&dir.path().join("absent.csv"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_append_replaces_by_id() {
        let mut table = ResultTable::new();
        table.append(sample_record(1));
        let mut replacement = sample_record(1);
        replacement.time_minutes = Some(2.5);
        table.append(replacement);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(1).unwrap().time_minutes, Some(2.5));
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULTS_FILE);

        let mut table = ResultTable::new();
        let mut record = sample_record(3);
        record.time_minutes = Some(0.25);
        record.points_move_warp = Some(PathBuf::from("3/move.csv"));
        table.append(record);
        table.append(sample_record(0));
        table.persist(&path).unwrap();

        let reloaded = ResultTable::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get(3), table.get(3));
        assert_eq!(
            reloaded.ids(),
            [0, 3].into_iter().collect::<FxHashSet<u64>>()
        );
        // No stray temp file left behind
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[test]
    fn test_persist_sorted_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULTS_FILE);

        let mut table = ResultTable::new();
        for id in [5, 1, 3] {
            table.append(sample_record(id));
        }
        table.persist(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let ids: Vec<&str> = contents
            .lines()
            .skip(1)
            .map(|line| line.split(',').next().unwrap())
            .collect();
        assert_eq!(ids, vec!["1", "3", "5"]);
    }

    #[test]
    fn test_is_complete_needs_both_dir_and_entry() {
        let dir = tempfile::tempdir().unwrap();
        let unit_dir = dir.path().join("4");

        let mut table = ResultTable::new();
        // Entry without folder: not complete
        table.append(sample_record(4));
        assert!(!table.is_complete(4, &unit_dir));

        // Folder without entry: interrupted run, retryable
        std::fs::create_dir_all(&unit_dir).unwrap();
        assert!(!table.is_complete(5, &unit_dir.with_file_name("5")));

        // Both: complete
        assert!(table.is_complete(4, &unit_dir));
    }

    #[test]
    fn test_load_skips_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULTS_FILE);
        std::fs::write(
            &path,
            "ID,Reference image,Moving image,Reference landmarks,Moving landmarks\n\
             0,a.png,b.png,a.csv,b.csv\n\
             not-an-id,c.png,d.png,c.csv,d.csv\n",
        )
        .unwrap();

        let table = ResultTable::load(&path);
        assert_eq!(table.len(), 1);
        assert!(table.contains(0));
    }

    #[test]
    fn test_load_positional_ids_without_id_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULTS_FILE);
        std::fs::write(
            &path,
            "Reference image,Moving image,Reference landmarks,Moving landmarks\n\
             a.png,b.png,a.csv,b.csv\n\
             c.png,d.png,c.csv,d.csv\n",
        )
        .unwrap();

        let table = ResultTable::load(&path);
        assert_eq!(table.len(), 2);
        assert!(table.contains(0));
        assert!(table.contains(1));
    }
}
