//! Statement building and row insertion against the target store.

use crate::error::{MigrateError, Result};
use ahash::AHashMap;
use rusqlite::Connection;

/// Build a positional `INSERT INTO <table> VALUES (...)` statement.
///
/// No column list is emitted; literals must already be normalized.
pub fn build_insert(table: &str, row: &[String]) -> String {
    let values_len: usize = row.iter().map(|v| v.len() + 2).sum();
    let mut sql = String::with_capacity(table.len() + values_len + 24);

    sql.push_str("INSERT INTO ");
    sql.push_str(table);
    sql.push_str(" VALUES (");
    for (i, value) in row.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(value);
    }
    sql.push(')');

    sql
}

/// Writes target rows into the store, one statement per row
pub struct RowWriter<'a> {
    conn: &'a Connection,
    /// Column count per destination table; `None` when the table is unknown
    column_counts: AHashMap<String, Option<usize>>,
    rows_written: u64,
}

impl<'a> RowWriter<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            column_counts: AHashMap::new(),
            rows_written: 0,
        }
    }

    /// Insert one row after checking it against the table's column count.
    ///
    /// A table the store does not know about is not checked: the INSERT runs
    /// anyway so the store's own error is surfaced.
    pub fn insert(&mut self, table: &str, row: &[String]) -> Result<()> {
        if let Some(expected) = self.column_count(table)? {
            if expected != row.len() {
                return Err(MigrateError::column_mismatch(table, expected, row.len()));
            }
        }

        let sql = build_insert(table, row);
        tracing::trace!(%sql, "executing insert");
        self.conn
            .execute(&sql, [])
            .map_err(|e| MigrateError::store(format!("INSERT INTO {} was rejected", table), e))?;

        self.rows_written += 1;
        Ok(())
    }

    /// Number of columns declared for `table`, cached after the first lookup.
    ///
    /// `pragma_table_info` resolves an unqualified name the same way the
    /// INSERT does (temp, then main, then attached databases).
    pub fn column_count(&mut self, table: &str) -> Result<Option<usize>> {
        if let Some(count) = self.column_counts.get(table) {
            return Ok(*count);
        }

        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info(?1)",
                rusqlite::params![table],
                |row| row.get(0),
            )
            .map_err(|e| {
                MigrateError::store(format!("could not read columns of '{}'", table), e)
            })?;

        let count = if count > 0 { Some(count as usize) } else { None };
        self.column_counts.insert(table.to_string(), count);
        Ok(count)
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}
