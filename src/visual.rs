//! Visualization collaborator interface
//!
//! Rendering is an external concern; the core only defines the seam. A
//! visualizer receives a completed record plus the run's roots and may
//! produce one figure artifact. Failures are logged by the driver and never
//! affect the result table.

use std::path::PathBuf;

use crate::config::RunPaths;
use crate::table::ExperimentRecord;
use crate::Result;

/// Produces an optional figure for one completed experiment record.
pub trait Visualizer: Send + Sync {
    /// Render a figure for `record`, returning its path when one was
    /// produced.
    ///
    /// # Errors
    ///
    /// Errors are logged by the caller and do not affect the run outcome.
    fn visualize(&self, record: &ExperimentRecord, paths: &RunPaths) -> Result<Option<PathBuf>>;
}

/// Placeholder visualizer that renders nothing.
#[derive(Debug, Default)]
pub struct NullVisualizer;

impl Visualizer for NullVisualizer {
    fn visualize(&self, _record: &ExperimentRecord, _paths: &RunPaths) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cover::CoverRow;

    #[test]
    fn test_null_visualizer_produces_nothing() {
        let record = ExperimentRecord::new(
            0,
            CoverRow {
                image_ref: PathBuf::from("a.png"),
                image_move: PathBuf::from("b.png"),
                points_ref: PathBuf::from("a.csv"),
                points_move: PathBuf::from("b.csv"),
            },
        );
        let paths = RunPaths {
            dataset_root: PathBuf::from("/data"),
            experiment_root: PathBuf::from("/out"),
        };
        assert!(NullVisualizer.visualize(&record, &paths).unwrap().is_none());
    }
}
