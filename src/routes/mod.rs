//! Line-range routing of dump lines to destination tables.
//!
//! The dump's own table names are ignored; a line is migrated only when its
//! 1-based number falls inside one of the configured inclusive ranges.

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// An inclusive range of dump lines that belongs to one destination table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRoute {
    /// First line (1-based, inclusive)
    pub start: u64,
    /// Last line (inclusive)
    pub end: u64,
    /// Destination table
    pub table: String,
}

impl TableRoute {
    pub fn new(start: u64, end: u64, table: impl Into<String>) -> Self {
        Self {
            start,
            end,
            table: table.into(),
        }
    }

    pub fn contains(&self, line: u64) -> bool {
        line >= self.start && line <= self.end
    }

    /// Number of lines covered by the route
    pub fn line_count(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Outcome of routing a single line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch<'a> {
    Table(&'a str),
    Skip,
}

/// YAML layout of a routes file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesFile {
    pub routes: Vec<TableRoute>,
}

/// Validated, sorted, non-overlapping set of routes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<TableRoute>,
}

impl RouteTable {
    /// Validate and sort a set of routes
    pub fn new(mut routes: Vec<TableRoute>) -> anyhow::Result<Self> {
        if routes.is_empty() {
            anyhow::bail!("At least one table route is required");
        }

        for route in &routes {
            if route.start == 0 {
                anyhow::bail!(
                    "Route for '{}' starts at line 0; line numbers are 1-based",
                    route.table
                );
            }
            if route.start > route.end {
                anyhow::bail!(
                    "Route for '{}' has start {} after end {}",
                    route.table,
                    route.start,
                    route.end
                );
            }
            if !IDENTIFIER_RE.is_match(&route.table) {
                anyhow::bail!("Invalid table name in route: '{}'", route.table);
            }
        }

        routes.sort_by_key(|r| r.start);

        for pair in routes.windows(2) {
            if pair[1].start <= pair[0].end {
                anyhow::bail!(
                    "Routes overlap: {}..={} ({}) and {}..={} ({})",
                    pair[0].start,
                    pair[0].end,
                    pair[0].table,
                    pair[1].start,
                    pair[1].end,
                    pair[1].table
                );
            }
        }

        Ok(Self { routes })
    }

    /// The ranges used for the historical CAOL dump
    pub fn default_routes() -> Self {
        Self {
            routes: vec![
                TableRoute::new(30929, 37981, "cao_cliente"),
                TableRoute::new(52615, 52767, "cao_fatura"),
                TableRoute::new(116295, 116435, "cao_usuario"),
                TableRoute::new(120386, 120536, "permissao_sistema"),
            ],
        }
    }

    /// Load routes from a YAML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read routes file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid routes file: {}", path.display()))
    }

    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let file: RoutesFile = serde_yaml_ng::from_str(yaml)?;
        Self::new(file.routes)
    }

    /// Route a 1-based line number
    pub fn dispatch(&self, line: u64) -> Dispatch<'_> {
        let idx = self.routes.partition_point(|r| r.end < line);
        match self.routes.get(idx) {
            Some(route) if route.contains(line) => Dispatch::Table(&route.table),
            _ => Dispatch::Skip,
        }
    }

    /// Last line any route covers; nothing after it is migrated
    pub fn last_line(&self) -> u64 {
        self.routes.last().map(|r| r.end).unwrap_or(0)
    }

    pub fn routes(&self) -> &[TableRoute] {
        &self.routes
    }

    /// Destination tables in route order, without duplicates
    pub fn tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = Vec::with_capacity(self.routes.len());
        for route in &self.routes {
            if !tables.contains(&route.table.as_str()) {
                tables.push(&route.table);
            }
        }
        tables
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        let file = RoutesFile {
            routes: self.routes.clone(),
        };
        Ok(serde_yaml_ng::to_string(&file)?)
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::default_routes()
    }
}
