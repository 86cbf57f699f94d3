//! The migration run: schema scripts, then routed dump rows, in one transaction.
//!
//! Either every schema script and every routed row is committed, or the
//! transaction is rolled back and the store is left as it was.

use crate::dump::{line_text, open_dump};
use crate::error::MigrateError;
use crate::normalize::RuleCounts;
use crate::parser::{RowSplitter, SplitMode};
use crate::progress::byte_progress_bar;
use crate::routes::{Dispatch, RouteTable};
use crate::schema;
use crate::writer::RowWriter;
use ahash::AHashMap;
use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Configuration for a migration run
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    /// SQLite database file; `None` runs against an in-memory store
    pub database: Option<PathBuf>,
    /// Directory of schema scripts
    pub schema_dir: PathBuf,
    /// Legacy dump file
    pub dump: PathBuf,
    pub routes: RouteTable,
    pub split_mode: SplitMode,
    /// Run everything, then roll back instead of committing
    pub dry_run: bool,
    pub progress: bool,
}

impl MigrateConfig {
    pub fn new(database: Option<PathBuf>, schema_dir: PathBuf, dump: PathBuf) -> Self {
        Self {
            database,
            schema_dir,
            dump,
            routes: RouteTable::default_routes(),
            split_mode: SplitMode::default(),
            dry_run: false,
            progress: false,
        }
    }
}

/// Rows written to one destination table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub table: String,
    pub rows: u64,
}

/// Statistics from a migration run
#[derive(Debug, Default, Clone, Serialize)]
pub struct MigrateStats {
    pub scripts_applied: usize,
    /// Dump lines read (reading stops after the last routed line)
    pub lines_read: u64,
    pub lines_routed: u64,
    pub rows_inserted: u64,
    /// Cells per normalization rule (zero dates, hex dates, untouched)
    pub cells: RuleCounts,
    /// Per-table row counts, in route order
    pub tables: Vec<TableStats>,
    /// False for dry runs
    pub committed: bool,
    pub duration_secs: f64,
}

impl MigrateStats {
    pub fn lines_skipped(&self) -> u64 {
        self.lines_read - self.lines_routed
    }

    pub fn rows_for(&self, table: &str) -> u64 {
        self.tables
            .iter()
            .find(|t| t.table == table)
            .map(|t| t.rows)
            .unwrap_or(0)
    }
}

impl std::fmt::Display for MigrateStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} scripts, {} rows from {} routed lines in {:.2}s",
            self.scripts_applied, self.rows_inserted, self.lines_routed, self.duration_secs
        )
    }
}

/// Open the target store
pub fn open_store(database: Option<&Path>) -> Result<Connection> {
    match database {
        Some(path) => Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display())),
        None => Connection::open_in_memory().context("Failed to create in-memory database"),
    }
}

/// Run a full migration against the configured store
pub fn run(config: &MigrateConfig) -> Result<MigrateStats> {
    let mut conn = open_store(config.database.as_deref())?;
    run_on(&mut conn, config)
}

/// Run a full migration against an already open connection.
///
/// Any error drops the transaction guard, which rolls everything back.
pub fn run_on(conn: &mut Connection, config: &MigrateConfig) -> Result<MigrateStats> {
    let start = Instant::now();
    let mut stats = MigrateStats::default();

    let tx = conn
        .transaction()
        .context("Failed to begin migration transaction")?;

    let scripts = schema::list_scripts(&config.schema_dir)?;
    stats.scripts_applied = schema::apply_scripts(&tx, &scripts)?;

    load_rows(&tx, config, &mut stats)?;

    if config.dry_run {
        tx.rollback().context("Failed to roll back dry run")?;
        tracing::info!("dry run complete, transaction rolled back");
    } else {
        tx.commit().context("Failed to commit migration")?;
        stats.committed = true;
    }

    stats.duration_secs = start.elapsed().as_secs_f64();
    tracing::info!(%stats, committed = stats.committed, "migration finished");
    Ok(stats)
}

fn load_rows(conn: &Connection, config: &MigrateConfig, stats: &mut MigrateStats) -> Result<()> {
    let progress_bar = if config.progress {
        let size = std::fs::metadata(&config.dump)
            .with_context(|| format!("Cannot access dump file: {}", config.dump.display()))?
            .len();
        Some(byte_progress_bar(size))
    } else {
        None
    };

    let mut lines = open_dump(&config.dump, progress_bar.as_ref())?;
    let splitter = RowSplitter::new(config.split_mode);
    let mut writer = RowWriter::new(conn);
    let mut per_table: AHashMap<String, u64> = AHashMap::new();
    let last_line = config.routes.last_line();

    while let Some((number, bytes)) = lines.next_line()? {
        let table = match config.routes.dispatch(number) {
            Dispatch::Table(table) => table,
            Dispatch::Skip if number >= last_line => break,
            Dispatch::Skip => continue,
        };

        let inserted = insert_line(&splitter, &mut writer, table, bytes, &mut stats.cells)
            .map_err(|e| e.at_line(number))?;

        tracing::debug!(line = number, table, rows = inserted, "migrated line");
        stats.lines_routed += 1;
        *per_table.entry(table.to_string()).or_insert(0) += inserted as u64;

        if number >= last_line {
            break;
        }
    }

    if let Some(pb) = progress_bar {
        pb.finish_with_message("dump processed");
    }

    stats.lines_read = lines.line_number();
    stats.rows_inserted = writer.rows_written();
    stats.tables = config
        .routes
        .tables()
        .into_iter()
        .map(|table| TableStats {
            table: table.to_string(),
            rows: per_table.get(table).copied().unwrap_or(0),
        })
        .collect();

    Ok(())
}

/// Split, normalize and insert every row on one routed line
fn insert_line(
    splitter: &RowSplitter,
    writer: &mut RowWriter<'_>,
    table: &str,
    bytes: &[u8],
    cells: &mut RuleCounts,
) -> Result<usize, MigrateError> {
    let text = line_text(bytes)?;
    let rows = splitter.target_rows_counted(text, cells)?;
    for row in &rows {
        writer.insert(table, row)?;
    }
    Ok(rows.len())
}
