//! Schema script discovery and application.
//!
//! Scripts are plain files of DDL in the store's dialect. They run in file
//! name order, inside the caller's transaction, before any row is inserted.

use crate::error::MigrateError;
use anyhow::Context;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

/// List the schema scripts in `dir`, sorted by file name.
///
/// Dot-files and subdirectories are ignored.
pub fn list_scripts(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Cannot read schema directory: {}", dir.display()))?;

    let mut scripts = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));

        if hidden || !entry.file_type()?.is_file() {
            continue;
        }
        scripts.push(path);
    }

    if scripts.is_empty() {
        anyhow::bail!("No schema scripts found in {}", dir.display());
    }

    scripts.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(scripts)
}

/// Execute each script in order, returning how many were applied
pub fn apply_scripts(conn: &Connection, scripts: &[PathBuf]) -> anyhow::Result<usize> {
    for script in scripts {
        let sql = fs::read_to_string(script)
            .with_context(|| format!("Failed to read schema script: {}", script.display()))?;

        tracing::info!(script = %script.display(), "applying schema script");
        conn.execute_batch(&sql).map_err(|e| {
            MigrateError::store(
                format!("schema script {} failed", script.display()),
                e,
            )
        })?;
    }

    Ok(scripts.len())
}
