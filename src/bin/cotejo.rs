//! Benchmark CLI: run a registration method over a cover table.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cotejo::{Benchmark, RegistrationMethod, RunConfig, TemplateMethod};

/// Benchmark an image-registration method over a cover table of
/// reference/moving pairs with landmark annotations.
#[derive(Debug, Parser)]
#[command(name = "cotejo", version, about)]
struct Args {
    /// Cover CSV listing reference/moving image and landmark pairs
    #[arg(short, long)]
    cover: PathBuf,

    /// Output root; the experiment folder is created underneath
    #[arg(short, long)]
    output: PathBuf,

    /// Dataset root for cover-relative paths (default: the cover's folder)
    #[arg(short, long)]
    dataset: Option<PathBuf>,

    /// Worker pool size; 1 runs sequentially (default: 80% of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Timestamp the experiment folder name (fresh run, never resumes)
    #[arg(long)]
    unique: bool,

    /// Run the visualization pass after statistics
    #[arg(long)]
    visual: bool,

    /// Registration method name; used as the experiment folder name
    #[arg(long, default_value = "identity", requires = "exec")]
    name: String,

    /// Shell command template for the external method, repeatable; lines run
    /// in order per pair. Placeholders: {reference_image}, {moving_image},
    /// {reference_landmarks}, {moving_landmarks}, {output_dir}, {id}.
    /// Without --exec the identity baseline runs instead.
    #[arg(long)]
    exec: Vec<String>,

    /// Summary percentiles, comma separated
    #[arg(long, value_delimiter = ',')]
    percentiles: Option<Vec<f64>>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut builder = RunConfig::builder(&args.cover, &args.output)
        .unique(args.unique)
        .visual(args.visual);
    if let Some(dataset) = &args.dataset {
        builder = builder.dataset(dataset);
    }
    if let Some(jobs) = args.jobs {
        builder = builder.jobs(jobs);
    }
    if let Some(percentiles) = args.percentiles {
        builder = builder.percentiles(percentiles);
    }
    let config = builder.build();

    let benchmark = if args.exec.is_empty() {
        Benchmark::identity(config)
    } else {
        let method: Arc<dyn RegistrationMethod> =
            Arc::new(TemplateMethod::new(args.name, args.exec));
        Benchmark::new(config, method)
    };

    let table = benchmark
        .run()
        .context("benchmark run failed during startup")?;
    tracing::info!(records = table.len(), "benchmark complete");
    Ok(())
}
