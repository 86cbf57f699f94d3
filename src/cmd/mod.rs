mod check;
mod migrate;
mod routes;

use crate::parser::SplitMode;
use crate::routes::RouteTable;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "caol-migrate")]
#[command(version)]
#[command(
    about = "Migrate the legacy CAOL MySQL dump into a schema-managed SQLite database",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply schema scripts and load the routed dump rows in one transaction
    Migrate {
        /// Legacy dump file (supports .gz, .bz2, .xz, .zst compression)
        #[arg(default_value = "banco_de_dados.sql")]
        dump: PathBuf,

        /// Target SQLite database file
        #[arg(short, long, default_value = "caol.db")]
        database: PathBuf,

        /// Directory of schema scripts, applied in file name order
        #[arg(short, long, default_value = "migrations")]
        migrations: PathBuf,

        /// YAML file with line-range routes (defaults to the built-in CAOL ranges)
        #[arg(short, long)]
        routes: Option<PathBuf>,

        /// Row splitter
        #[arg(long, value_enum, default_value_t = SplitMode::Tokenize)]
        split: SplitMode,

        /// Run the whole migration against an in-memory store and roll back
        #[arg(long)]
        dry_run: bool,

        /// Show progress while reading the dump
        #[arg(short, long)]
        progress: bool,

        /// Output statistics as JSON
        #[arg(long)]
        json: bool,

        /// Log every routed line
        #[arg(short, long)]
        verbose: bool,
    },

    /// Compare the tokenizer and the fixed-width splitter on every routed line
    Check {
        /// Legacy dump file (supports .gz, .bz2, .xz, .zst compression)
        #[arg(default_value = "banco_de_dados.sql")]
        dump: PathBuf,

        /// YAML file with line-range routes (defaults to the built-in CAOL ranges)
        #[arg(short, long)]
        routes: Option<PathBuf>,

        /// Maximum divergent lines to print
        #[arg(long, default_value = "20")]
        max_report: usize,

        /// Exit non-zero if any line diverges or fails to split
        #[arg(long)]
        strict: bool,

        /// Show progress while reading the dump
        #[arg(short, long)]
        progress: bool,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,

        /// Log every reviewed line
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show the line-range routes, or route a single line
    Routes {
        /// YAML file with line-range routes (defaults to the built-in CAOL ranges)
        #[arg(short, long)]
        routes: Option<PathBuf>,

        /// Print where this 1-based dump line is routed
        #[arg(short, long)]
        line: Option<u64>,

        /// Print the routes as YAML (usable as a --routes file)
        #[arg(long)]
        yaml: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Migrate {
            dump,
            database,
            migrations,
            routes,
            split,
            dry_run,
            progress,
            json,
            verbose,
        } => {
            init_tracing(verbose);
            migrate::run(
                dump, database, migrations, routes, split, dry_run, progress, json,
            )
        }
        Commands::Check {
            dump,
            routes,
            max_report,
            strict,
            progress,
            json,
            verbose,
        } => {
            init_tracing(verbose);
            check::run(dump, routes, max_report, strict, progress, json)
        }
        Commands::Routes { routes, line, yaml } => routes::run(routes, line, yaml),
        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "caol-migrate",
                &mut io::stdout(),
            );
            Ok(())
        }
    }
}

/// Load routes from a YAML file, or fall back to the built-in ranges
fn load_routes(path: Option<&Path>) -> anyhow::Result<RouteTable> {
    match path {
        Some(p) => RouteTable::load(p),
        None => Ok(RouteTable::default_routes()),
    }
}

fn init_tracing(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "caol_migrate=debug" } else { "warn" })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}
