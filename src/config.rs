//! Run configuration
//!
//! Typed replacement for the loose parameter dictionary the benchmark grew up
//! with: required paths, pool size, and summary options live in one struct
//! that is validated before any unit runs and echoed verbatim into the text
//! report.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{Error, Result};

/// Percentiles reported by the summary export when none are configured.
pub const DEFAULT_PERCENTILES: [f64; 5] = [5.0, 25.0, 50.0, 75.0, 95.0];

/// Benchmark run parameters.
///
/// Construct via [`RunConfig::new`] for defaults or [`RunConfig::builder`]
/// when overriding the pool size or summary percentiles.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    /// Cover CSV listing the registration pairs
    pub path_cover: PathBuf,
    /// Root under which the experiment folder is created
    pub path_output: PathBuf,
    /// Root against which cover-relative paths resolve; defaults to the cover
    /// file's parent directory
    pub path_dataset: Option<PathBuf>,
    /// Worker pool size; `<= 1` runs sequentially in the caller's thread
    pub jobs: usize,
    /// Timestamp the experiment folder name (fresh run, never resumes)
    pub unique: bool,
    /// Run the visualization pass after statistics
    pub visual: bool,
    /// Percentiles included in the summary export
    pub percentiles: Vec<f64>,
}

impl RunConfig {
    /// Configuration with default pool size and percentiles.
    #[must_use]
    pub fn new(path_cover: impl Into<PathBuf>, path_output: impl Into<PathBuf>) -> Self {
        Self {
            path_cover: path_cover.into(),
            path_output: path_output.into(),
            path_dataset: None,
            jobs: default_jobs(),
            unique: false,
            visual: false,
            percentiles: DEFAULT_PERCENTILES.to_vec(),
        }
    }

    /// Builder with the required paths filled in.
    #[must_use]
    pub fn builder(
        path_cover: impl Into<PathBuf>,
        path_output: impl Into<PathBuf>,
    ) -> RunConfigBuilder {
        RunConfigBuilder {
            config: Self::new(path_cover, path_output),
        }
    }

    /// Check the startup invariants and create the output root.
    ///
    /// # Errors
    ///
    /// [`Error::CoverNotFound`] when the cover file is absent,
    /// [`Error::Config`] for out-of-range percentiles, and [`Error::Io`] when
    /// the output root cannot be created. All of these abort the run before
    /// any unit executes.
    pub fn validate(&self) -> Result<()> {
        if !self.path_cover.is_file() {
            return Err(Error::CoverNotFound(self.path_cover.clone()));
        }
        for p in &self.percentiles {
            if !(*p > 0.0 && *p < 100.0) {
                return Err(Error::Config(format!(
                    "percentile {p} outside the open interval (0, 100)"
                )));
            }
        }
        std::fs::create_dir_all(&self.path_output)?;
        Ok(())
    }

    /// Root against which cover-relative paths resolve.
    #[must_use]
    pub fn dataset_root(&self) -> PathBuf {
        self.path_dataset.clone().unwrap_or_else(|| {
            self.path_cover
                .parent()
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
        })
    }

    /// Experiment folder for a named method under the output root.
    ///
    /// With `unique` set the name carries a timestamp, so the run starts from
    /// scratch instead of resuming an earlier table.
    #[must_use]
    pub fn experiment_root(&self, method_name: &str) -> PathBuf {
        let name = if self.unique {
            format!(
                "{method_name}_{}",
                chrono::Utc::now().format("%Y%m%d-%H%M%S")
            )
        } else {
            method_name.to_string()
        };
        self.path_output.join(name)
    }
}

/// Builder for [`RunConfig`].
#[derive(Debug)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    /// Set the dataset root for resolving cover-relative paths.
    #[must_use]
    pub fn dataset(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path_dataset = Some(path.into());
        self
    }

    /// Set the worker pool size.
    #[must_use]
    pub const fn jobs(mut self, jobs: usize) -> Self {
        self.config.jobs = jobs;
        self
    }

    /// Timestamp the experiment folder name.
    #[must_use]
    pub const fn unique(mut self, unique: bool) -> Self {
        self.config.unique = unique;
        self
    }

    /// Enable the visualization pass.
    #[must_use]
    pub const fn visual(mut self, visual: bool) -> Self {
        self.config.visual = visual;
        self
    }

    /// Override the summary percentiles.
    #[must_use]
    pub fn percentiles(mut self, percentiles: Vec<f64>) -> Self {
        self.config.percentiles = percentiles;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> RunConfig {
        self.config
    }
}

/// Default pool size: 80% of the available CPUs, at least one.
#[must_use]
pub fn default_jobs() -> usize {
    let cpus = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    (cpus * 4 / 5).max(1)
}

/// Resolved roots for one run: where dataset inputs live and where this
/// experiment writes.
#[derive(Debug, Clone)]
pub struct RunPaths {
    /// Resolution root for cover-relative input paths
    pub dataset_root: PathBuf,
    /// Experiment folder holding per-id subfolders, tables, and summaries
    pub experiment_root: PathBuf,
}

impl RunPaths {
    /// Derive the roots for `method_name` from a validated configuration.
    #[must_use]
    pub fn new(config: &RunConfig, method_name: &str) -> Self {
        Self {
            dataset_root: config.dataset_root(),
            experiment_root: config.experiment_root(method_name),
        }
    }

    /// Resolve a dataset-relative path; absolute paths pass through.
    #[must_use]
    pub fn resolve_data(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dataset_root.join(path)
        }
    }

    /// Resolve an experiment-relative path; absolute paths pass through.
    #[must_use]
    pub fn resolve_expt(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.experiment_root.join(path)
        }
    }
}
