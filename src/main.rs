// Allow dead code for items that are part of the public API but only used in tests
#![allow(dead_code)]

mod check;
mod cmd;
mod dump;
mod error;
mod migrate;
mod normalize;
mod parser;
mod progress;
mod routes;
mod schema;
mod writer;

use clap::Parser;
use cmd::Cli;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = cmd::run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
