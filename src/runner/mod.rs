//! Execution driver: cover table in, result table out
//!
//! The driver turns each cover row into an isolated unit of work and
//! dispatches it either in the caller's thread (`jobs <= 1`) or across a
//! fixed-size worker pool. Workers return plain records over a channel; the
//! driver thread alone appends to the shared table and re-persists it after
//! every completion, so an abrupt termination loses at most the in-flight
//! units. Ids are assigned from cover-table position before dispatch, so the
//! final table is independent of completion order.

pub mod unit;

use std::path::Path;
use std::sync::{mpsc, Arc};

use rayon::prelude::*;

use crate::config::{RunConfig, RunPaths};
use crate::cover::{load_cover, CoverRow};
use crate::method::{IdentityBaseline, RegistrationMethod};
use crate::stats;
use crate::table::{ExperimentRecord, ResultTable, RESULTS_FILE};
use crate::visual::{NullVisualizer, Visualizer};
use crate::{Error, Result};

pub use unit::{process_unit, UNIT_LOG_FILE};

/// One benchmark run: configuration, the method under test, and an optional
/// visualization collaborator.
pub struct Benchmark {
    config: RunConfig,
    method: Arc<dyn RegistrationMethod>,
    visualizer: Arc<dyn Visualizer>,
}

impl Benchmark {
    /// Benchmark for an injected registration method.
    #[must_use]
    pub fn new(config: RunConfig, method: Arc<dyn RegistrationMethod>) -> Self {
        Self {
            config,
            method,
            visualizer: Arc::new(NullVisualizer),
        }
    }

    /// Benchmark of the identity-deformation baseline.
    #[must_use]
    pub fn identity(config: RunConfig) -> Self {
        Self::new(config, Arc::new(IdentityBaseline))
    }

    /// Replace the visualization collaborator.
    #[must_use]
    pub fn with_visualizer(mut self, visualizer: Arc<dyn Visualizer>) -> Self {
        self.visualizer = visualizer;
        self
    }

    /// Run the full pipeline: execute every unit, fold landmark statistics
    /// into the table, export the summary, and optionally visualize.
    ///
    /// # Errors
    ///
    /// Only startup validation errors propagate: missing cover file or
    /// columns, bad configuration, unusable output root, or pool
    /// construction failure. Anything local to one unit or record is logged
    /// and absorbed.
    pub fn run(&self) -> Result<ResultTable> {
        self.config.validate()?;
        let rows = load_cover(&self.config.path_cover)?;
        let paths = RunPaths::new(&self.config, self.method.name());
        std::fs::create_dir_all(&paths.experiment_root)?;

        let pool = self.build_pool()?;
        let results_path = paths.experiment_root.join(RESULTS_FILE);
        let mut table = ResultTable::load(&results_path);

        tracing::info!(
            method = self.method.name(),
            pairs = rows.len(),
            jobs = self.config.jobs,
            experiment = %paths.experiment_root.display(),
            "-> starting benchmark"
        );
        self.execute(&rows, &paths, &results_path, &mut table, pool.as_ref());

        stats::summarize(&mut table, &paths);
        if let Err(err) = table.persist(&results_path) {
            tracing::error!(%err, "failed to persist result table after statistics");
        }
        stats::export_summary(&table, &paths.experiment_root, &self.config)?;

        if self.config.visual {
            self.visualize(&table, &paths, pool.as_ref());
        }
        Ok(table)
    }

    /// Fixed-size pool for the parallel phases; `None` means sequential.
    fn build_pool(&self) -> Result<Option<rayon::ThreadPool>> {
        if self.config.jobs <= 1 {
            return Ok(None);
        }
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.jobs)
            .build()
            .map(Some)
            .map_err(|err| Error::Pool(err.to_string()))
    }

    /// Registration phase: dispatch every row, stream completions into the
    /// table, persist after each one.
    fn execute(
        &self,
        rows: &[CoverRow],
        paths: &RunPaths,
        results_path: &Path,
        table: &mut ResultTable,
        pool: Option<&rayon::ThreadPool>,
    ) {
        let completed = table.ids();
        let total = rows.len();

        match pool {
            None => {
                for (done, (id, row)) in (0_u64..).zip(rows.iter()).enumerate() {
                    let result = process_unit(id, row, paths, self.method.as_ref(), &completed);
                    merge(table, results_path, result, done + 1, total);
                }
            }
            Some(pool) => {
                let completed = Arc::new(completed);
                let (sender, receiver) = mpsc::channel::<Option<ExperimentRecord>>();
                for (id, row) in (0_u64..).zip(rows.iter()) {
                    let sender = sender.clone();
                    let row = row.clone();
                    let paths = paths.clone();
                    let method = Arc::clone(&self.method);
                    let completed = Arc::clone(&completed);
                    pool.spawn(move || {
                        let result = process_unit(id, &row, &paths, method.as_ref(), &completed);
                        // Receiver hung up means the driver is gone; nothing
                        // left to merge into.
                        let _ = sender.send(result);
                    });
                }
                drop(sender);
                for (done, result) in (1..).zip(receiver.iter()) {
                    merge(table, results_path, result, done, total);
                }
            }
        }
    }

    /// Visualization phase: observational only, failures never touch the
    /// table.
    fn visualize(&self, table: &ResultTable, paths: &RunPaths, pool: Option<&rayon::ThreadPool>) {
        let records = table.records_sorted();
        let render = |record: &&ExperimentRecord| match self.visualizer.visualize(record, paths) {
            Ok(Some(figure)) => {
                tracing::debug!(id = record.id, figure = %figure.display(), "figure written");
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(id = record.id, %err, "visualization failed");
            }
        };
        match pool {
            None => records.iter().for_each(render),
            Some(pool) => pool.install(|| records.par_iter().for_each(render)),
        }
    }
}

/// Apply one completion to the table: append non-skip results, persist, and
/// report progress.
fn merge(
    table: &mut ResultTable,
    results_path: &Path,
    result: Option<ExperimentRecord>,
    done: usize,
    total: usize,
) {
    if let Some(record) = result {
        let id = record.id;
        table.append(record);
        if let Err(err) = table.persist(results_path) {
            tracing::error!(id, %err, "failed to persist result table");
        }
        tracing::info!(id, done, total, "<- registration finished");
    } else {
        tracing::info!(done, total, "<- unit skipped or dropped");
    }
}
