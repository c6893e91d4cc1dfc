//! Cover table: the input manifest of registration pairs
//!
//! Each row names a reference/moving image pair and their landmark files,
//! all relative to the dataset root. The row's position in the file is its
//! experiment id for the rest of the pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Cover column: reference image path
pub const COL_IMAGE_REF: &str = "Reference image";
/// Cover column: moving image path
pub const COL_IMAGE_MOVE: &str = "Moving image";
/// Cover column: reference landmarks path
pub const COL_POINTS_REF: &str = "Reference landmarks";
/// Cover column: moving landmarks path
pub const COL_POINTS_MOVE: &str = "Moving landmarks";

/// Required cover columns, in schema order.
pub const COVER_COLUMNS: [&str; 4] = [
    COL_IMAGE_REF,
    COL_IMAGE_MOVE,
    COL_POINTS_REF,
    COL_POINTS_MOVE,
];

/// One registration task as declared by the user.
///
/// Immutable once loaded; all paths are dataset-root-relative until resolved
/// through [`crate::config::RunPaths`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverRow {
    /// Reference (fixed) image
    #[serde(rename = "Reference image")]
    pub image_ref: PathBuf,
    /// Moving image to be registered onto the reference
    #[serde(rename = "Moving image")]
    pub image_move: PathBuf,
    /// Landmarks annotated in the reference frame
    #[serde(rename = "Reference landmarks")]
    pub points_ref: PathBuf,
    /// Landmarks annotated in the moving frame
    #[serde(rename = "Moving landmarks")]
    pub points_move: PathBuf,
}

/// Load the cover table and verify the required columns are present.
///
/// # Errors
///
/// [`Error::CoverNotFound`] when the file is absent,
/// [`Error::MissingColumns`] naming every absent required column, or
/// [`Error::Csv`] when a row fails to parse. All are fatal startup errors.
pub fn load_cover(path: &Path) -> Result<Vec<CoverRow>> {
    if !path.is_file() {
        return Err(Error::CoverNotFound(path.to_path_buf()));
    }

    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let missing: Vec<String> = COVER_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| (*col).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingColumns(missing));
    }

    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    tracing::info!(pairs = rows.len(), "-> loaded cover table");
    Ok(rows)
}
