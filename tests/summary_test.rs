//! End-to-end statistics: the worked example from the landmark layout and
//! the summary export, including the empty-run error path.

mod common;

use cotejo::stats::{SUMMARY_CSV_FILE, SUMMARY_TXT_FILE};
use cotejo::table::{tre_column, rtre_column, Stage};
use cotejo::{Benchmark, RegistrationMethod, Result, UnitContext};

#[test]
fn test_summary_reports_worked_example() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::make_config(dir.path(), 2);

    let table = Benchmark::identity(config).run().unwrap();
    let record = table.get(0).unwrap();

    let init = record.init_stats.unwrap();
    assert!((init.tre.mean - common::INIT_MEAN).abs() < 1e-12);

    // 100x100 image: diagonal ~= 141.42, normalized mean ~= 0.00707
    let diagonal = record.image_diagonal.unwrap();
    assert!((diagonal - 141.421_356).abs() < 1e-5);
    assert!((init.rtre.unwrap().mean - 0.007_071).abs() < 1e-5);

    // Identity baseline: exactly one warped-landmark field, perfect final
    assert!(record.points_ref_warp.is_some());
    assert!(record.points_move_warp.is_none());
    assert!(record.final_stats.unwrap().tre.mean.abs() < 1e-12);

    // Summary files in the experiment root
    let root = common::experiment_root(dir.path());
    let csv = std::fs::read_to_string(root.join(SUMMARY_CSV_FILE)).unwrap();
    let init_mean_row = csv
        .lines()
        .find(|line| line.starts_with(&tre_column("Mean", Stage::Init)))
        .unwrap();
    let fields: Vec<&str> = init_mean_row.split(',').collect();
    // Column,Count,Mean,...
    assert_eq!(fields[1], "2");
    assert!((fields[2].parse::<f64>().unwrap() - 1.0).abs() < 1e-12);
    assert!(csv.contains(&rtre_column("Mean", Stage::Final)));

    let report = std::fs::read_to_string(root.join(SUMMARY_TXT_FILE)).unwrap();
    assert!(report.contains("CONFIGURATION:"));
    assert!(report.contains("RESULTS:"));
    assert!(report.contains(&tre_column("Max", Stage::Final)));
}

/// Method that fails every unit, leaving the table empty.
struct AlwaysFails;

impl RegistrationMethod for AlwaysFails {
    fn name(&self) -> &str {
        "always-fails"
    }

    fn commands(&self, _ctx: &UnitContext<'_>) -> Result<Vec<String>> {
        Ok(vec!["false".to_string()])
    }
}

#[test]
fn test_empty_table_skips_summary_export() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::make_config(dir.path(), 2);

    let table = Benchmark::new(config, std::sync::Arc::new(AlwaysFails))
        .run()
        .unwrap();
    assert!(table.is_empty());

    let root = dir.path().join("out/always-fails");
    assert!(root.is_dir());
    assert!(!root.join(SUMMARY_CSV_FILE).exists());
    assert!(!root.join(SUMMARY_TXT_FILE).exists());
}
