//! Registration-method strategy
//!
//! The benchmark treats the registration algorithm as an opaque external
//! collaborator: a method contributes shell command lines plus optional
//! prepare/extract/cleanup hooks around them. The hooks are an injected
//! trait with no-op defaults rather than an inheritance hierarchy, so a
//! method override touches exactly the seam it needs.
//!
//! Two implementations ship with the crate: [`IdentityBaseline`], which
//! simulates an ideal registration by copying inputs (the default when no
//! real method is configured), and [`TemplateMethod`], which substitutes
//! row paths into user-supplied shell-line templates.

use std::path::{Path, PathBuf};

use crate::config::RunPaths;
use crate::cover::CoverRow;
use crate::table::ExperimentRecord;
use crate::Result;

/// Everything a method hook may need about the unit it is running in.
#[derive(Debug)]
pub struct UnitContext<'a> {
    /// Stable experiment id of this unit
    pub id: u64,
    /// The cover row being registered
    pub cover: &'a CoverRow,
    /// Dataset and experiment roots for path resolution
    pub paths: &'a RunPaths,
    /// This unit's output directory, absolute
    pub output_dir: PathBuf,
    /// Output directory relative to the experiment root (goes in the table)
    pub reg_dir: PathBuf,
}

impl UnitContext<'_> {
    /// Absolute path of the reference image.
    #[must_use]
    pub fn image_ref(&self) -> PathBuf {
        self.paths.resolve_data(&self.cover.image_ref)
    }

    /// Absolute path of the moving image.
    #[must_use]
    pub fn image_move(&self) -> PathBuf {
        self.paths.resolve_data(&self.cover.image_move)
    }

    /// Absolute path of the reference landmarks.
    #[must_use]
    pub fn points_ref(&self) -> PathBuf {
        self.paths.resolve_data(&self.cover.points_ref)
    }

    /// Absolute path of the moving landmarks.
    #[must_use]
    pub fn points_move(&self) -> PathBuf {
        self.paths.resolve_data(&self.cover.points_move)
    }

    /// Where an artifact named after `source`'s basename would land inside
    /// the output directory. Returns the absolute probe path and the
    /// experiment-root-relative path recorded in the table.
    #[must_use]
    pub fn artifact_for(&self, source: &Path) -> Option<(PathBuf, PathBuf)> {
        let basename = source.file_name()?;
        Some((self.output_dir.join(basename), self.reg_dir.join(basename)))
    }
}

/// One registration method: command generation plus hook points around it.
///
/// `prepare` and `cleanup` default to no-ops; `extract_artifacts` defaults
/// to the well-known-basename probe shared by most methods. Only
/// `commands` has no sensible default.
pub trait RegistrationMethod: Send + Sync {
    /// Method name; becomes the experiment folder name under the output root.
    fn name(&self) -> &str;

    /// Stage extra files into the output directory before execution.
    ///
    /// # Errors
    ///
    /// An error fails the unit (logged and dropped, never retried within the
    /// run).
    fn prepare(&self, _ctx: &UnitContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Shell lines to run for this unit, in order; all must exit zero.
    ///
    /// # Errors
    ///
    /// An error fails the unit.
    fn commands(&self, ctx: &UnitContext<'_>) -> Result<Vec<String>>;

    /// Probe the output directory for warped artifacts and populate the
    /// record fields whose files exist on disk.
    ///
    /// The default mapping follows the common convention: the warped image
    /// takes the reference image's basename and lands in the warped-moving-
    /// image field; the warped landmarks take the moving landmarks' basename
    /// and land in the warped-reference-landmarks field. Methods warping the
    /// opposite direction override this.
    fn extract_artifacts(&self, ctx: &UnitContext<'_>, record: &mut ExperimentRecord) {
        if let Some((probe, rel)) = ctx.artifact_for(&ctx.cover.image_ref) {
            if probe.is_file() {
                record.image_move_warp = Some(rel);
            }
        }
        if let Some((probe, rel)) = ctx.artifact_for(&ctx.cover.points_move) {
            if probe.is_file() {
                record.points_ref_warp = Some(rel);
            }
        }
    }

    /// Remove scratch files after artifact extraction.
    ///
    /// # Errors
    ///
    /// An error here is logged but does not fail the unit; the record is
    /// already populated.
    fn cleanup(&self, _ctx: &UnitContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Identity-deformation baseline: copies the reference image and the moving
/// landmarks into the output directory, simulating a registration whose warp
/// is the identity. Used when no real registration method is configured.
#[derive(Debug, Default)]
pub struct IdentityBaseline;

impl RegistrationMethod for IdentityBaseline {
    fn name(&self) -> &str {
        "identity"
    }

    fn commands(&self, ctx: &UnitContext<'_>) -> Result<Vec<String>> {
        Ok(vec![
            format!(
                "cp {} {}",
                shell_quote(&ctx.image_ref()),
                shell_quote(&ctx.output_dir)
            ),
            format!(
                "cp {} {}",
                shell_quote(&ctx.points_move()),
                shell_quote(&ctx.output_dir)
            ),
        ])
    }
}

/// Placeholder substituted into [`TemplateMethod`] lines.
const PLACEHOLDERS: [&str; 6] = [
    "{reference_image}",
    "{moving_image}",
    "{reference_landmarks}",
    "{moving_landmarks}",
    "{output_dir}",
    "{id}",
];

/// External method configured as shell-line templates.
///
/// Each line may reference `{reference_image}`, `{moving_image}`,
/// `{reference_landmarks}`, `{moving_landmarks}`, `{output_dir}` and `{id}`;
/// paths substitute as shell-quoted absolute paths. Artifact extraction uses
/// the default basename probe.
#[derive(Debug)]
pub struct TemplateMethod {
    name: String,
    templates: Vec<String>,
}

impl TemplateMethod {
    /// Method from a name and one or more command templates.
    #[must_use]
    pub fn new(name: impl Into<String>, templates: Vec<String>) -> Self {
        Self {
            name: name.into(),
            templates,
        }
    }
}

impl RegistrationMethod for TemplateMethod {
    fn name(&self) -> &str {
        &self.name
    }

    fn commands(&self, ctx: &UnitContext<'_>) -> Result<Vec<String>> {
        let values = [
            shell_quote(&ctx.image_ref()),
            shell_quote(&ctx.image_move()),
            shell_quote(&ctx.points_ref()),
            shell_quote(&ctx.points_move()),
            shell_quote(&ctx.output_dir),
            ctx.id.to_string(),
        ];
        Ok(self
            .templates
            .iter()
            .map(|template| {
                let mut line = template.clone();
                for (placeholder, value) in PLACEHOLDERS.iter().zip(&values) {
                    line = line.replace(placeholder, value);
                }
                line
            })
            .collect())
    }
}

/// Single-quote a path for `sh -c`, escaping embedded quotes.
#[must_use]
pub fn shell_quote(path: &Path) -> String {
    let raw = path.to_string_lossy();
    format!("'{}'", raw.replace('\'', "'\\''"))
}
