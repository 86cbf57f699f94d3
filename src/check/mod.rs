//! Splitter audit over the routed lines of a dump.
//!
//! Runs the quote-aware tokenizer and the historical fixed-width splitter
//! side by side and records every line where the resulting target rows
//! differ. Nothing is written to a store.

use crate::dump::{line_text, open_dump};
use crate::parser::{RowSplitter, SplitMode, TargetRow};
use crate::progress::byte_progress_bar;
use crate::routes::{Dispatch, RouteTable};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;

/// Configuration for a splitter audit
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub dump: PathBuf,
    pub routes: RouteTable,
    /// Divergences kept in the report; the count is always exact
    pub max_divergences: usize,
    pub progress: bool,
}

/// What one split mode produced for a line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SplitOutcome {
    Rows { rows: Vec<TargetRow> },
    Failed { error: String },
}

impl SplitOutcome {
    fn of(splitter: &RowSplitter, line: &str) -> Self {
        match splitter.target_rows(line) {
            Ok(rows) => SplitOutcome::Rows { rows },
            Err(e) => SplitOutcome::Failed {
                error: e.to_string(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SplitOutcome::Failed { .. })
    }
}

impl std::fmt::Display for SplitOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitOutcome::Rows { rows } => {
                let cells: Vec<String> = rows.iter().map(|r| r.len().to_string()).collect();
                write!(f, "{} row(s), cells [{}]", rows.len(), cells.join(", "))
            }
            SplitOutcome::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

/// A routed line on which the two split modes disagree, or both fail
#[derive(Debug, Clone, Serialize)]
pub struct Divergence {
    pub line: u64,
    pub table: String,
    pub tokenized: SplitOutcome,
    pub fixed_width: SplitOutcome,
}

/// Result of an audit
#[derive(Debug, Default, Clone, Serialize)]
pub struct CheckReport {
    pub lines_checked: u64,
    pub divergent_lines: u64,
    /// Lines both modes failed on identically
    pub failed_lines: u64,
    /// First `max_divergences` divergent or failed lines
    pub divergences: Vec<Divergence>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.divergent_lines == 0 && self.failed_lines == 0
    }
}

/// Audit every routed line of the dump
pub fn run(config: &CheckConfig) -> Result<CheckReport> {
    let progress_bar = if config.progress {
        let size = std::fs::metadata(&config.dump)
            .with_context(|| format!("Cannot access dump file: {}", config.dump.display()))?
            .len();
        Some(byte_progress_bar(size))
    } else {
        None
    };

    let mut report = CheckReport::default();
    let mut lines = open_dump(&config.dump, progress_bar.as_ref())?;
    let tokenizer = RowSplitter::new(SplitMode::Tokenize);
    let fixed = RowSplitter::new(SplitMode::FixedWidth);
    let last_line = config.routes.last_line();

    while let Some((number, bytes)) = lines.next_line()? {
        let table = match config.routes.dispatch(number) {
            Dispatch::Table(table) => table,
            Dispatch::Skip if number >= last_line => break,
            Dispatch::Skip => continue,
        };
        report.lines_checked += 1;

        let (tokenized, fixed_width) = match line_text(bytes) {
            Ok(text) => (
                SplitOutcome::of(&tokenizer, text),
                SplitOutcome::of(&fixed, text),
            ),
            Err(e) => {
                let failed = SplitOutcome::Failed {
                    error: e.to_string(),
                };
                (failed.clone(), failed)
            }
        };

        let agree = tokenized == fixed_width;
        if !agree || tokenized.is_failed() {
            if agree {
                report.failed_lines += 1;
            } else {
                report.divergent_lines += 1;
            }

            tracing::debug!(line = number, table, agree, "line needs review");
            if report.divergences.len() < config.max_divergences {
                report.divergences.push(Divergence {
                    line: number,
                    table: table.to_string(),
                    tokenized,
                    fixed_width,
                });
            }
        }

        if number >= last_line {
            break;
        }
    }

    if let Some(pb) = progress_bar {
        pb.finish_with_message("check complete");
    }

    Ok(report)
}
