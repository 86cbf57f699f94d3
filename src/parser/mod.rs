//! Row splitting for legacy dump lines.
//!
//! A routed dump line is either a full `INSERT INTO ... VALUES (...),(...);`
//! statement or a bare `(...),` continuation fragment. The statement
//! boilerplate is stripped and the remaining tuples are split into raw cell
//! literals, which are then normalized into target rows.


use crate::error::{MigrateError, Result};
use crate::normalize::{classify, RuleCounts};
use once_cell::sync::Lazy;
use regex::Regex;

/// One fully normalized row, positionally ordered
pub type TargetRow = Vec<String>;

static INSERT_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*INSERT\b").unwrap());

/// `VALUES` as a whole word directly followed by the first tuple, so table or
/// column names containing "values" are not mistaken for the keyword
static INSERT_VALUES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^\s*INSERT\b.*?\bVALUES\s*(\()").unwrap());

/// How a value payload is split into cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SplitMode {
    /// Quote-aware tokenizer; handles several tuples per line
    #[default]
    Tokenize,
    /// Historical fixed-width trim followed by a plain comma split
    #[value(alias = "fixed")]
    FixedWidth,
}

impl std::fmt::Display for SplitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitMode::Tokenize => write!(f, "tokenize"),
            SplitMode::FixedWidth => write!(f, "fixed-width"),
        }
    }
}

/// Strip `INSERT ... VALUES` from a statement line.
///
/// Continuation fragments are returned unchanged.
pub fn strip_insert_prefix(line: &str) -> Result<&str> {
    if !INSERT_PREFIX_RE.is_match(line) {
        return Ok(line);
    }

    match INSERT_VALUES_RE.captures(line).and_then(|c| c.get(1)) {
        Some(paren) => Ok(&line[paren.start()..]),
        None => Err(MigrateError::malformed(
            "INSERT statement missing VALUES keyword",
        )),
    }
}

/// Split a payload of one or more `(a, b, ...)` tuples into raw cells.
///
/// Single-quoted strings may contain commas, parentheses and semicolons;
/// both `\'` and `''` escapes are recognised. Tuples are separated by `,`
/// and the payload may end with `,` or `;`.
pub fn split_tuples(payload: &str) -> Result<Vec<Vec<&str>>> {
    let bytes = payload.as_bytes();
    let mut rows = Vec::new();
    let mut pos = skip_whitespace(bytes, 0);

    while pos < bytes.len() {
        if bytes[pos] != b'(' {
            return Err(MigrateError::malformed(format!(
                "expected '(' at column {}, found '{}'",
                pos + 1,
                preview(&payload[pos..])
            )));
        }

        let (cells, next) = split_tuple(payload, pos + 1)?;
        rows.push(cells);
        pos = skip_whitespace(bytes, next);

        match bytes.get(pos) {
            None => break,
            Some(b',') => pos = skip_whitespace(bytes, pos + 1),
            Some(b';') => {
                pos = skip_whitespace(bytes, pos + 1);
                if pos < bytes.len() {
                    return Err(MigrateError::malformed(format!(
                        "unexpected text after ';': '{}'",
                        preview(&payload[pos..])
                    )));
                }
                break;
            }
            Some(_) => {
                return Err(MigrateError::malformed(format!(
                    "expected ',' or ';' after value tuple at column {}",
                    pos + 1
                )));
            }
        }
    }

    if rows.is_empty() {
        return Err(MigrateError::malformed("no value tuple found"));
    }

    Ok(rows)
}

/// Split the cells of one tuple starting just after its opening parenthesis.
/// Returns the cells and the position after the closing parenthesis.
fn split_tuple(payload: &str, start: usize) -> Result<(Vec<&str>, usize)> {
    let bytes = payload.as_bytes();
    let mut cells = Vec::new();
    let mut cell_start = start;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut i = start;

    while i < bytes.len() {
        let b = bytes[i];

        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    i += 1;
                } else {
                    in_string = false;
                }
            }
        } else {
            match b {
                b'\'' => in_string = true,
                b'(' => depth += 1,
                b')' if depth > 0 => depth -= 1,
                b')' => {
                    push_cell(&mut cells, &payload[cell_start..i])?;
                    return Ok((cells, i + 1));
                }
                b',' if depth == 0 => {
                    push_cell(&mut cells, &payload[cell_start..i])?;
                    cell_start = i + 1;
                }
                _ => {}
            }
        }

        i += 1;
    }

    if in_string {
        Err(MigrateError::malformed("unterminated string literal"))
    } else {
        Err(MigrateError::malformed("unterminated value tuple"))
    }
}

fn push_cell<'a>(cells: &mut Vec<&'a str>, cell: &'a str) -> Result<()> {
    if cell.trim().is_empty() {
        return Err(MigrateError::malformed(format!(
            "empty value at position {}",
            cells.len() + 1
        )));
    }
    cells.push(cell);
    Ok(())
}

/// Historical splitter: drop the opening `(` and the closing `),`/`);`,
/// then split on every comma.
///
/// Commas inside quoted strings are not respected.
pub fn split_fixed_width(payload: &str) -> Result<Vec<Vec<&str>>> {
    let body = payload.trim_end_matches(['\r', '\n']);

    if !body.starts_with('(') || !(body.ends_with("),") || body.ends_with(");")) {
        return Err(MigrateError::malformed(format!(
            "line does not have the '(...),' or '(...);' shape: '{}'",
            preview(body)
        )));
    }

    let inner = &body[1..body.len() - 2];
    Ok(vec![inner.split(',').collect()])
}

/// Turns routed dump lines into normalized target rows
#[derive(Debug, Clone, Copy, Default)]
pub struct RowSplitter {
    mode: SplitMode,
}

impl RowSplitter {
    pub fn new(mode: SplitMode) -> Self {
        Self { mode }
    }

    /// Split a payload (already stripped of `INSERT ... VALUES`) into raw cells
    pub fn split<'a>(&self, payload: &'a str) -> Result<Vec<Vec<&'a str>>> {
        match self.mode {
            SplitMode::Tokenize => split_tuples(payload),
            SplitMode::FixedWidth => split_fixed_width(payload),
        }
    }

    /// Split a raw dump line and normalize every cell
    pub fn target_rows(&self, line: &str) -> Result<Vec<TargetRow>> {
        self.target_rows_counted(line, &mut RuleCounts::default())
    }

    /// Same as [`target_rows`](Self::target_rows), tallying the rule applied
    /// to each cell into `counts`
    pub fn target_rows_counted(
        &self,
        line: &str,
        counts: &mut RuleCounts,
    ) -> Result<Vec<TargetRow>> {
        let payload = strip_insert_prefix(line)?;
        if payload.trim().is_empty() {
            return Err(MigrateError::malformed("routed line carries no values"));
        }

        let tuples = self.split(payload)?;
        let mut rows = Vec::with_capacity(tuples.len());
        for cells in tuples {
            let mut row = TargetRow::with_capacity(cells.len());
            for cell in cells {
                let normalized = classify(cell)?;
                counts.record(normalized.rule);
                row.push(normalized.literal.into_owned());
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

fn preview(s: &str) -> String {
    const MAX: usize = 40;
    if s.chars().count() <= MAX {
        s.to_string()
    } else {
        let head: String = s.chars().take(MAX).collect();
        format!("{}...", head)
    }
}
