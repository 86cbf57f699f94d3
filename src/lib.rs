// Allow dead code for items that are part of the public API but only used in tests
#![allow(dead_code)]

pub mod check;
pub mod dump;
pub mod error;
pub mod migrate;
pub mod normalize;
pub mod parser;
pub mod progress;
pub mod routes;
pub mod schema;
pub mod writer;
