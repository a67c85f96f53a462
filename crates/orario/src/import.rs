use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::db;
use crate::parser;

/// What one import run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Files parsed successfully
    pub files: usize,
    /// Lessons found in those files
    pub lessons: usize,
    /// Lessons that were not already stored
    pub inserted: usize,
}

pub fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// All CSV exports directly inside `dir`, sorted by name.
pub fn find_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_csv(p))
        .collect();

    files.sort();
    Ok(files)
}

/// Parse one export and store its lessons. Returns (found, inserted).
pub fn import_file(conn: &Connection, path: &Path) -> Result<(usize, usize)> {
    let lessons = parser::parse_csv_file(path)?;
    let inserted = db::import_lessons(conn, &lessons)
        .with_context(|| format!("Failed to store lessons from {}", path.display()))?;

    debug!(file = %path.display(), found = lessons.len(), inserted, "Imported file");
    Ok((lessons.len(), inserted))
}

/// Import files and directories of exports.
///
/// Directories contribute every CSV file they contain. A file that fails to
/// parse is logged and skipped; the rest of the batch still goes in.
pub fn import_paths(conn: &Connection, paths: &[PathBuf]) -> Result<ImportSummary> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(find_csv_files(path)?);
        } else {
            files.push(path.clone());
        }
    }

    let mut summary = ImportSummary::default();
    for file in &files {
        match import_file(conn, file) {
            Ok((found, inserted)) => {
                summary.files += 1;
                summary.lessons += found;
                summary.inserted += inserted;
            }
            Err(e) => {
                warn!(file = %file.display(), error = %e, "Failed to import file");
            }
        }
    }

    info!(
        files = summary.files,
        lessons = summary.lessons,
        inserted = summary.inserted,
        "Import finished"
    );
    Ok(summary)
}

/// Import every CSV export in a directory.
pub fn import_dir(conn: &Connection, dir: &Path) -> Result<ImportSummary> {
    import_paths(conn, &[dir.to_path_buf()])
}
