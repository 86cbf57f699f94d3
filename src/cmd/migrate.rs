//! Migrate command CLI handler.

use crate::migrate::{self, MigrateConfig, MigrateStats};
use crate::parser::SplitMode;
use std::path::PathBuf;

#[allow(clippy::too_many_arguments)]
pub fn run(
    dump: PathBuf,
    database: PathBuf,
    migrations: PathBuf,
    routes: Option<PathBuf>,
    split_mode: SplitMode,
    dry_run: bool,
    progress: bool,
    json: bool,
) -> anyhow::Result<()> {
    let routes = super::load_routes(routes.as_deref())?;

    // Dry runs never touch the database file
    let target = if dry_run { None } else { Some(database) };

    let config = MigrateConfig {
        database: target,
        schema_dir: migrations,
        dump,
        routes,
        split_mode,
        dry_run,
        progress,
    };

    if !json {
        match config.database {
            Some(ref db) => eprintln!("Migrating {} into {}...", config.dump.display(), db.display()),
            None => eprintln!("Dry run: migrating {} in memory...", config.dump.display()),
        }
    }

    let stats = migrate::run(&config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(&stats);
    }

    Ok(())
}

fn print_stats(stats: &MigrateStats) {
    eprintln!();
    eprintln!("Migration Statistics:");
    eprintln!("  Schema scripts applied: {}", stats.scripts_applied);
    eprintln!(
        "  Lines read: {} ({} routed, {} skipped)",
        stats.lines_read,
        stats.lines_routed,
        stats.lines_skipped()
    );
    eprintln!("  Rows inserted: {}", stats.rows_inserted);
    eprintln!(
        "  Cells rewritten: {} ({} zero dates, {} hex dates)",
        stats.cells.rewritten(),
        stats.cells.sentinel_dates,
        stats.cells.hex_dates
    );
    for table in &stats.tables {
        eprintln!("    {:<24} {:>8}", table.table, table.rows);
    }
    eprintln!("  Elapsed: {:.2}s", stats.duration_secs);
    eprintln!();

    if stats.committed {
        eprintln!("✓ Migration committed");
    } else {
        eprintln!("Dry run: transaction rolled back, nothing written");
    }
}
