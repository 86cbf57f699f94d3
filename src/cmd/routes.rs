//! Routes command CLI handler.

use crate::routes::Dispatch;
use std::path::PathBuf;

pub fn run(routes: Option<PathBuf>, line: Option<u64>, yaml: bool) -> anyhow::Result<()> {
    let routes = super::load_routes(routes.as_deref())?;

    if let Some(line) = line {
        match routes.dispatch(line) {
            Dispatch::Table(table) => println!("{}", table),
            Dispatch::Skip => println!("skip"),
        }
        return Ok(());
    }

    if yaml {
        print!("{}", routes.to_yaml()?);
        return Ok(());
    }

    println!("{:>10}  {:>10}  {:>8}  table", "start", "end", "lines");
    for route in routes.routes() {
        println!(
            "{:>10}  {:>10}  {:>8}  {}",
            route.start,
            route.end,
            route.line_count(),
            route.table
        );
    }

    Ok(())
}
