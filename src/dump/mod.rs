//! Line-oriented reading of the legacy dump.
//!
//! The dump may be compressed; the format is picked from the file extension.
//! Lines are numbered from 1 and handed out as raw bytes so lines that are
//! never routed don't have to be valid UTF-8.

use crate::error::{MigrateError, Result};
use crate::progress::ProgressReader;
use anyhow::Context;
use indicatif::ProgressBar;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

const READ_BUFFER_SIZE: usize = 256 * 1024;

/// Compression format detected from file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

impl Compression {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("gz" | "gzip") => Compression::Gzip,
            Some("bz2" | "bzip2") => Compression::Bzip2,
            Some("xz" | "lzma") => Compression::Xz,
            Some("zst" | "zstd") => Compression::Zstd,
            _ => Compression::None,
        }
    }

    /// Wrap a reader with the matching decompressor
    pub fn wrap_reader<'a>(
        &self,
        reader: Box<dyn Read + 'a>,
    ) -> std::io::Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Compression::None => reader,
            Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
            Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
            Compression::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
            Compression::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
        })
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Bzip2 => write!(f, "bzip2"),
            Compression::Xz => write!(f, "xz"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

/// Reads a dump one numbered line at a time
pub struct DumpLines<R: BufRead> {
    reader: R,
    buf: Vec<u8>,
    line_number: u64,
}

impl<R: BufRead> DumpLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(8 * 1024),
            line_number: 0,
        }
    }

    /// Next line with its 1-based number, terminator stripped
    pub fn next_line(&mut self) -> std::io::Result<Option<(u64, &[u8])>> {
        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }

        self.line_number += 1;
        let mut end = self.buf.len();
        while end > 0 && matches!(self.buf[end - 1], b'\n' | b'\r') {
            end -= 1;
        }
        Ok(Some((self.line_number, &self.buf[..end])))
    }

    /// Number of lines read so far
    pub fn line_number(&self) -> u64 {
        self.line_number
    }
}

/// Open a dump, optionally reporting on-disk bytes read to a progress bar
pub fn open_dump(
    path: &Path,
    progress: Option<&ProgressBar>,
) -> anyhow::Result<DumpLines<BufReader<Box<dyn Read>>>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open dump file: {}", path.display()))?;

    let raw: Box<dyn Read> = match progress {
        Some(pb) => {
            let pb = pb.clone();
            Box::new(ProgressReader::new(file, move |bytes| pb.set_position(bytes)))
        }
        None => Box::new(file),
    };

    let compression = Compression::from_path(path);
    let reader = compression
        .wrap_reader(raw)
        .with_context(|| format!("Failed to open {} stream: {}", compression, path.display()))?;

    Ok(DumpLines::new(BufReader::with_capacity(
        READ_BUFFER_SIZE,
        reader,
    )))
}

/// Decode a routed line as UTF-8
pub fn line_text(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes)
        .map_err(|e| MigrateError::malformed(format!("line is not valid UTF-8: {}", e)))
}
