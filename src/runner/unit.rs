//! Work item processor: one cover row from dispatch to record
//!
//! Implements the per-unit contract: derive the output directory, skip if
//! already complete, run the method's commands with combined output captured
//! to a per-unit log, time the execution, and probe for warped artifacts.
//! Anything that goes wrong inside a unit is logged and absorbed by
//! returning `None`; a failed unit leaves no table entry, so the next run
//! retries it.

use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;

use rustc_hash::FxHashSet;

use crate::config::RunPaths;
use crate::cover::CoverRow;
use crate::method::{RegistrationMethod, UnitContext};
use crate::table::ExperimentRecord;
use crate::{Error, Result};

/// File name of the per-unit command log inside the output directory.
pub const UNIT_LOG_FILE: &str = "registration.log";

/// Process one cover row.
///
/// Returns `None` both for a skip (unit already complete, nothing new to
/// merge) and for a per-unit failure (logged, dropped, retried on the next
/// run); `Some` carries the record to append and persist. `completed_ids` is
/// the table-membership snapshot taken before dispatch; pairing it with the
/// folder-existence check here gives the resume guarantee.
#[must_use]
pub fn process_unit(
    id: u64,
    cover: &CoverRow,
    paths: &RunPaths,
    method: &dyn RegistrationMethod,
    completed_ids: &FxHashSet<u64>,
) -> Option<ExperimentRecord> {
    let reg_dir = PathBuf::from(id.to_string());
    let output_dir = paths.resolve_expt(&reg_dir);

    if completed_ids.contains(&id) && output_dir.is_dir() {
        tracing::debug!(id, "already complete, skipping");
        return None;
    }

    let ctx = UnitContext {
        id,
        cover,
        paths,
        output_dir,
        reg_dir,
    };

    match execute(&ctx, method) {
        Ok(record) => Some(record),
        Err(err) => {
            tracing::warn!(id, %err, "unit failed, dropped for retry on the next run");
            None
        }
    }
}

/// The fallible middle of a unit: everything between the skip check and the
/// driver's append.
fn execute(ctx: &UnitContext<'_>, method: &dyn RegistrationMethod) -> Result<ExperimentRecord> {
    for input in [
        ctx.image_ref(),
        ctx.image_move(),
        ctx.points_ref(),
        ctx.points_move(),
    ] {
        if !input.is_file() {
            return Err(Error::Other(format!(
                "input missing: {}",
                input.display()
            )));
        }
    }

    std::fs::create_dir_all(&ctx.output_dir)?;

    method.prepare(ctx)?;
    let commands = method.commands(ctx)?;

    let started = Instant::now();
    for command in &commands {
        run_command(ctx, command)?;
    }
    let minutes = started.elapsed().as_secs_f64() / 60.0;

    let mut record = ExperimentRecord::new(ctx.id, ctx.cover.clone());
    record.time_minutes = Some(minutes);
    method.extract_artifacts(ctx, &mut record);

    if let Err(err) = method.cleanup(ctx) {
        tracing::warn!(id = ctx.id, %err, "cleanup hook failed");
    }

    Ok(record)
}

/// Run one shell line with stdout and stderr appended to the unit log.
fn run_command(ctx: &UnitContext<'_>, command: &str) -> Result<()> {
    let log = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(ctx.output_dir.join(UNIT_LOG_FILE))?;
    let log_err = log.try_clone()?;

    tracing::debug!(id = ctx.id, command, "running");
    let status = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdout(log)
        .stderr(log_err)
        .status()?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::CommandFailed {
            status: status.to_string(),
            command: command.to_string(),
        })
    }
}
