//! `verify-pack` report rendering.
//!
//! Output format, one line per object in offset order:
//!
//! ```text
//! <hash> <type:-6> <declared> <packed> <offset>[ <depth> <base>]
//! ```
//!
//! followed by `non delta: N objects`, one `chain length = D: N object(s)`
//! line per depth in ascending order, and the `<path>: ok` status line.
//! Only the status line is printed outside verbose mode.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::path::Path;

use super::record::ObjectRecord;

/// Aggregates over a completed run plus the records they came from.
#[derive(Debug)]
pub struct Report<'a> {
    records: &'a [ObjectRecord],
    non_delta: u64,
    histogram: BTreeMap<u32, u64>,
}

impl<'a> Report<'a> {
    /// `records` must be in ascending offset order.
    #[must_use]
    pub fn new(records: &'a [ObjectRecord]) -> Self {
        let mut non_delta = 0u64;
        let mut histogram = BTreeMap::new();
        for record in records {
            if record.is_delta() {
                *histogram.entry(record.depth).or_insert(0u64) += 1;
            } else {
                non_delta += 1;
            }
        }
        Self {
            records,
            non_delta,
            histogram,
        }
    }

    #[must_use]
    pub fn non_delta_count(&self) -> u64 {
        self.non_delta
    }

    #[must_use]
    pub fn delta_count(&self) -> u64 {
        self.records.len() as u64 - self.non_delta
    }

    /// Delta count per chain depth.
    #[must_use]
    pub fn chain_histogram(&self) -> &BTreeMap<u32, u64> {
        &self.histogram
    }

    /// Writes the per-object lines and the summary block.
    pub fn write_verbose<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for record in self.records {
            writeln!(out, "{}", ObjectLine(record))?;
        }
        writeln!(out, "non delta: {} objects", self.non_delta)?;
        for (depth, count) in &self.histogram {
            let noun = if *count == 1 { "object" } else { "objects" };
            writeln!(out, "chain length = {depth}: {count} {noun}")?;
        }
        Ok(())
    }

    /// Writes the full report for `path`.
    pub fn write<W: Write>(&self, out: &mut W, path: &Path, verbose: bool) -> io::Result<()> {
        if verbose {
            self.write_verbose(out)?;
        }
        write_status_line(out, path)
    }
}

pub fn write_status_line<W: Write>(out: &mut W, path: &Path) -> io::Result<()> {
    writeln!(out, "{}: ok", path.display())
}

struct ObjectLine<'a>(&'a ObjectRecord);

impl fmt::Display for ObjectLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        let kind = match r.resolved_type {
            Some(kind) => kind.as_str(),
            None => r.disk_type.as_str(),
        };
        write!(
            f,
            "{} {:<6} {} {} {}",
            r.hash, kind, r.declared_size, r.packed_size, r.offset
        )?;
        if let Some(base) = &r.base_hash {
            write!(f, " {} {}", r.depth, base)?;
        }
        Ok(())
    }
}
