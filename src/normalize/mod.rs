//! Cell literal normalization.
//!
//! Rewrites the two legacy encodings the target store cannot accept:
//! the all-zero `DATETIME` sentinel and hex-encoded date strings
//! (`0x323030302d30312d3031`). Every other literal passes through.

use crate::error::{MigrateError, Result};
use serde::Serialize;
use std::borrow::Cow;

/// Zero-date sentinel emitted by the legacy store for "no date"
pub const ZERO_DATE: &str = "'0000-00-00 00:00:00'";

/// Placeholder written in place of [`ZERO_DATE`]
pub const PLACEHOLDER_DATE: &str = "'1800-01-00 00:00:00'";

const HEX_PREFIX: &str = "0x";

/// Which rule produced a normalized literal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    SentinelDate,
    HexDate,
    PassThrough,
}

/// How many cells each rule was applied to
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuleCounts {
    pub sentinel_dates: u64,
    pub hex_dates: u64,
    pub passed_through: u64,
}

impl RuleCounts {
    pub fn record(&mut self, rule: Rule) {
        match rule {
            Rule::SentinelDate => self.sentinel_dates += 1,
            Rule::HexDate => self.hex_dates += 1,
            Rule::PassThrough => self.passed_through += 1,
        }
    }

    /// Cells whose text was changed
    pub fn rewritten(&self) -> u64 {
        self.sentinel_dates + self.hex_dates
    }
}

/// A normalized literal together with the rule that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized<'a> {
    pub literal: Cow<'a, str>,
    pub rule: Rule,
}

/// Normalize one raw cell literal.
///
/// Leading whitespace left over from the tuple separator is dropped first.
pub fn normalize_literal(raw: &str) -> Result<String> {
    classify(raw).map(|n| n.literal.into_owned())
}

/// Normalize one raw cell literal, reporting which rule applied
pub fn classify(raw: &str) -> Result<Normalized<'_>> {
    let item = raw.trim_start();

    if item.trim_end() == ZERO_DATE {
        return Ok(Normalized {
            literal: Cow::Borrowed(PLACEHOLDER_DATE),
            rule: Rule::SentinelDate,
        });
    }

    if let Some(payload) = item.strip_prefix(HEX_PREFIX) {
        let text = decode_hex_literal(payload.trim_end())?;
        return Ok(Normalized {
            literal: Cow::Owned(quote(&text)),
            rule: Rule::HexDate,
        });
    }

    Ok(Normalized {
        literal: Cow::Borrowed(item),
        rule: Rule::PassThrough,
    })
}

/// Decode a hex payload (without the `0x` prefix) into UTF-8 text
pub fn decode_hex_literal(payload: &str) -> Result<String> {
    let bytes = hex::decode(payload)
        .map_err(|e| MigrateError::decode(format!("invalid hex literal '0x{}': {}", payload, e)))?;

    String::from_utf8(bytes).map_err(|e| {
        MigrateError::decode(format!(
            "hex literal '0x{}' is not valid UTF-8 text: {}",
            payload, e
        ))
    })
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
    out
}
