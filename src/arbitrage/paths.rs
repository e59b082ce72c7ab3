//! Triangular path enumeration and the `Start,Middle,End` path file.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::PathFileError;
use crate::market::{Currency, PairSymbol};

/// Header line of the path file.
pub const PATH_FILE_HEADER: &str = "Start,Middle,End";

/// Paths shared read-only between the detector and the HTTP status.
pub type SharedPaths = Arc<[TriangularPath]>;

/// Three distinct currencies forming a cycle `start -> middle -> end -> start`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TriangularPath {
    /// First currency.
    pub start: Currency,
    /// Second currency.
    pub middle: Currency,
    /// Third currency.
    pub end: Currency,
}

impl TriangularPath {
    /// Create a path.
    pub fn new(start: Currency, middle: Currency, end: Currency) -> Self {
        Self { start, middle, end }
    }

    /// Symbols the detector reads: `start·middle`, `middle·end`, `start·end`.
    pub fn lookup_symbols(&self) -> [PairSymbol; 3] {
        [
            PairSymbol::from_parts(&self.start, &self.middle),
            PairSymbol::from_parts(&self.middle, &self.end),
            PairSymbol::from_parts(&self.start, &self.end),
        ]
    }
}

impl fmt::Display for TriangularPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}->{}", self.start, self.middle, self.end)
    }
}

/// Whether `a·b` or `b·a` is a known symbol. Reuses `buf` for the lookups.
fn leg_known(buf: &mut String, known: &HashSet<PairSymbol>, a: &Currency, b: &Currency) -> bool {
    buf.clear();
    buf.push_str(a.as_str());
    buf.push_str(b.as_str());
    if known.contains(buf.as_str()) {
        return true;
    }

    buf.clear();
    buf.push_str(b.as_str());
    buf.push_str(a.as_str());
    known.contains(buf.as_str())
}

/// Every ordered triple of distinct currencies whose three cycle legs are
/// each known directly or as an inverse.
///
/// Cubic in the number of currencies; meant to run once at startup. Output
/// is sorted but callers should not rely on order.
pub fn enumerate_paths(known: &HashSet<PairSymbol>, currencies: &HashSet<Currency>) -> Vec<TriangularPath> {
    let mut sorted: Vec<&Currency> = currencies.iter().collect();
    sorted.sort();

    let mut buf = String::new();
    let mut paths = Vec::new();

    for &start in &sorted {
        for &middle in &sorted {
            if middle == start || !leg_known(&mut buf, known, start, middle) {
                continue;
            }

            for &end in &sorted {
                if end == start || end == middle {
                    continue;
                }
                if leg_known(&mut buf, known, middle, end) && leg_known(&mut buf, known, end, start) {
                    paths.push(TriangularPath::new(start.clone(), middle.clone(), end.clone()));
                }
            }
        }
    }

    debug!(currencies = sorted.len(), paths = paths.len(), "Enumerated triangular paths");
    paths
}

/// Write paths as `Start,Middle,End` rows.
pub fn write_paths<W: Write>(mut out: W, paths: &[TriangularPath]) -> Result<(), PathFileError> {
    writeln!(out, "{PATH_FILE_HEADER}")?;
    for path in paths {
        writeln!(out, "{},{},{}", path.start, path.middle, path.end)?;
    }
    out.flush()?;
    Ok(())
}

/// Read paths written by [`write_paths`]. Blank lines are ignored.
pub fn read_paths<R: BufRead>(input: R) -> Result<Vec<TriangularPath>, PathFileError> {
    let mut lines = input.lines();

    let header = lines.next().transpose()?.unwrap_or_default();
    if header.trim() != PATH_FILE_HEADER {
        return Err(PathFileError::Header {
            found: header.trim().to_string(),
        });
    }

    let mut paths = Vec::new();
    for (idx, line) in lines.enumerate() {
        let line = line?;
        let line_no = idx + 2;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [start, middle, end] = fields.as_slice() else {
            return Err(PathFileError::Row {
                line: line_no,
                reason: format!("expected 3 fields, found {}", fields.len()),
            });
        };

        if start.is_empty() || middle.is_empty() || end.is_empty() {
            return Err(PathFileError::Row {
                line: line_no,
                reason: "empty currency".to_string(),
            });
        }
        if start == middle || middle == end || start == end {
            return Err(PathFileError::Row {
                line: line_no,
                reason: format!("currencies must be distinct: {line}"),
            });
        }

        paths.push(TriangularPath::new(
            Currency::new(*start),
            Currency::new(*middle),
            Currency::new(*end),
        ));
    }

    Ok(paths)
}

/// Save paths to `file`.
pub fn save_paths(file: &Path, paths: &[TriangularPath]) -> Result<(), PathFileError> {
    let out = fs::File::create(file)?;
    write_paths(std::io::BufWriter::new(out), paths)?;
    info!(file = %file.display(), paths = paths.len(), "Saved path file");
    Ok(())
}

/// Load paths from `file`.
pub fn load_paths(file: &Path) -> Result<Vec<TriangularPath>, PathFileError> {
    let input = fs::File::open(file)?;
    let paths = read_paths(BufReader::new(input))?;
    info!(file = %file.display(), paths = paths.len(), "Loaded path file");
    Ok(paths)
}
