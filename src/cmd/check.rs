//! Check command CLI handler.

use crate::check::{self, CheckConfig, CheckReport};
use std::path::PathBuf;

pub fn run(
    dump: PathBuf,
    routes: Option<PathBuf>,
    max_report: usize,
    strict: bool,
    progress: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = CheckConfig {
        dump,
        routes: super::load_routes(routes.as_deref())?,
        max_divergences: max_report,
        progress,
    };

    let report = check::run(&config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if strict && !report.is_clean() {
        anyhow::bail!(
            "{} divergent and {} failing lines found",
            report.divergent_lines,
            report.failed_lines
        );
    }

    Ok(())
}

fn print_report(report: &CheckReport) {
    eprintln!("Split Check:");
    eprintln!("  Routed lines checked: {}", report.lines_checked);
    eprintln!("  Divergent lines: {}", report.divergent_lines);
    eprintln!("  Lines failing in both modes: {}", report.failed_lines);

    if !report.divergences.is_empty() {
        eprintln!();
        for d in &report.divergences {
            eprintln!("  line {} ({}):", d.line, d.table);
            eprintln!("    tokenize:    {}", d.tokenized);
            eprintln!("    fixed-width: {}", d.fixed_width);
        }
    }

    let shown = report.divergences.len() as u64;
    let total = report.divergent_lines + report.failed_lines;
    if total > shown {
        eprintln!("  ... and {} more", total - shown);
    }

    eprintln!();
    if report.is_clean() {
        eprintln!("✓ Both splitters agree on every routed line");
    }
}
