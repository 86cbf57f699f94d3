//! Error types for the migration pipeline.
//!
//! Every failure aborts the enclosing transaction; the kind and the dump line
//! number are carried so the top level can print a single failure report.

use std::fmt;

/// Category of a migration failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Line shape did not match a value tuple or `INSERT ... VALUES` statement
    MalformedLine,
    /// Hex payload was not valid hex, or decoded bytes were not UTF-8
    DecodeError,
    /// Row length disagrees with the destination table's column count
    ColumnMismatch,
    /// The store rejected a statement (syntax, type, constraint, missing table)
    StoreError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::MalformedLine => write!(f, "MalformedLine"),
            ErrorKind::DecodeError => write!(f, "DecodeError"),
            ErrorKind::ColumnMismatch => write!(f, "ColumnMismatch"),
            ErrorKind::StoreError => write!(f, "StoreError"),
        }
    }
}

/// A failure raised while processing one dump line
#[derive(Debug)]
pub struct MigrateError {
    kind: ErrorKind,
    line: Option<u64>,
    detail: String,
    source: Option<rusqlite::Error>,
}

impl MigrateError {
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedLine, detail)
    }

    pub fn decode(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::DecodeError, detail)
    }

    pub fn column_mismatch(table: &str, expected: usize, found: usize) -> Self {
        Self::new(
            ErrorKind::ColumnMismatch,
            format!(
                "table '{}' has {} columns but row has {} values",
                table, expected, found
            ),
        )
    }

    pub fn store(detail: impl Into<String>, source: rusqlite::Error) -> Self {
        Self {
            kind: ErrorKind::StoreError,
            line: None,
            detail: detail.into(),
            source: Some(source),
        }
    }

    fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            line: None,
            detail: detail.into(),
            source: None,
        }
    }

    /// Attach the 1-based dump line number the error was raised on
    pub fn at_line(mut self, line: u64) -> Self {
        self.line = Some(line);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn line(&self) -> Option<u64> {
        self.line
    }
}

impl fmt::Display for MigrateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line {
            write!(f, "line {}: ", line)?;
        }
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

impl std::error::Error for MigrateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

pub type Result<T> = std::result::Result<T, MigrateError>;
