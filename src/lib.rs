//! # Cotejo: Resumable Image-Registration Benchmark Harness
//!
//! Cotejo drives an external image-registration method over a cover table of
//! reference/moving image pairs, collects the declared warped artifacts, and
//! evaluates landmark-alignment error (TRE, and rTRE when the image diagonal
//! is known) into a resumable result table plus CSV/text summaries.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Jidoka**: a failed unit stops only itself; the batch always completes
//! - **Poka-Yoke safety**: completion pairs folder existence with table
//!   membership, so interrupted units are retried, finished ones never re-run
//! - **Muda elimination**: the table is re-persisted after every completion,
//!   bounding data loss on abrupt termination to the in-flight units
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cotejo::{Benchmark, RunConfig};
//!
//! let config = RunConfig::builder("data/cover.csv", "results")
//!     .jobs(4)
//!     .build();
//!
//! // Identity-deformation baseline; inject a RegistrationMethod for a real
//! // external tool.
//! let table = Benchmark::identity(config).run()?;
//! println!("completed {} registrations", table.len());
//! # Ok::<(), cotejo::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod cover;
pub mod error;
pub mod landmarks;
pub mod method;
pub mod runner;
pub mod stats;
pub mod table;
pub mod visual;

pub use config::{RunConfig, RunConfigBuilder, RunPaths};
pub use cover::{load_cover, CoverRow};
pub use error::{Error, Result};
pub use landmarks::{load_landmarks, DistanceStats, Point};
pub use method::{IdentityBaseline, RegistrationMethod, TemplateMethod, UnitContext};
pub use runner::Benchmark;
pub use table::{ExperimentRecord, ResultTable, Stage, WarpDirection};
pub use visual::{NullVisualizer, Visualizer};
