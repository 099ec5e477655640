//! Verification run orchestration.
//!
//! A run decodes the index, checks the pack header against it, then fills
//! object records phase by phase: entry headers, packed sizes, delta
//! chains and finally resolved types. The report is rendered only after
//! every phase has succeeded, so a failing run never emits a partial
//! summary or an `ok` line.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::bytes::BytesView;
use super::chain::{walk_chains, ChainError, UnresolvedBase};
use super::header::{HeaderCache, HeaderDecoder, HeaderError, HeaderSource};
use super::index::{IdxError, PackIndex};
use super::limits::DecodeLimits;
use super::object_id::{ObjectFormat, ObjectId};
use super::record::ObjectRecord;
use super::report::Report;
use super::resolve::{resolve_types, MaterializeError, PackObjects, ResolveError};
use super::span::{assign_packed_sizes, SpanError};

/// Options for one verification run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Print per-object lines and the chain summary.
    pub verbose: bool,
    /// Hash width of the pack. Never sniffed from the files.
    pub format: ObjectFormat,
    pub limits: DecodeLimits,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VerifyError {
    #[error("file must have .idx or .pack extension: {}", path.display())]
    InvalidFileName { path: PathBuf },
    #[error("failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode index file: {0}")]
    IndexCorrupt(#[from] IdxError),
    #[error("invalid pack header: {0}")]
    InvalidPackHeader(#[source] HeaderError),
    #[error("pack header declares {pack_count} objects, index has {index_count}")]
    PackHeaderMismatch { pack_count: u32, index_count: usize },
    #[error("truncated header at offset {offset}: {source}")]
    TruncatedHeader {
        offset: u64,
        #[source]
        source: HeaderError,
    },
    #[error("failed to seek to offset {offset} (pack body ends at {pack_len})")]
    SeekFailure { offset: u64, pack_len: u64 },
    #[error("invalid object type {tag} at offset {offset}")]
    InvalidObjectType { offset: u64, tag: u8 },
    #[error("unresolved delta base for {hash} at offset {offset}: {reason}")]
    UnresolvedDeltaBase {
        offset: u64,
        hash: ObjectId,
        reason: UnresolvedBase,
    },
    #[error("failed to get object {hash} at offset {offset}: {source}")]
    MaterializationFailure {
        offset: u64,
        hash: ObjectId,
        #[source]
        source: MaterializeError,
    },
    #[error("failed to write report: {0}")]
    Output(#[source] io::Error),
}

impl VerifyError {
    fn from_header(offset: u64, err: HeaderError) -> Self {
        match err {
            HeaderError::SeekFailure { offset, body_end } => Self::SeekFailure {
                offset,
                pack_len: body_end,
            },
            HeaderError::InvalidObjectType { offset, tag } => {
                Self::InvalidObjectType { offset, tag }
            }
            HeaderError::PackTooSmall { .. }
            | HeaderError::BadSignature
            | HeaderError::UnsupportedVersion(_) => Self::InvalidPackHeader(err),
            source => Self::TruncatedHeader { offset, source },
        }
    }
}

impl From<SpanError> for VerifyError {
    fn from(err: SpanError) -> Self {
        match err {
            SpanError::NotAscending { .. } => {
                Self::IndexCorrupt(IdxError::corrupt("offsets not strictly increasing"))
            }
            SpanError::PastTrailer {
                offset, file_size, ..
            } => Self::SeekFailure {
                offset,
                pack_len: file_size,
            },
        }
    }
}

impl From<ChainError> for VerifyError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Unresolved {
                offset,
                hash,
                reason,
            } => Self::UnresolvedDeltaBase {
                offset,
                hash,
                reason,
            },
            ChainError::Header { offset, source } => Self::from_header(offset, source),
        }
    }
}

impl From<ResolveError> for VerifyError {
    fn from(err: ResolveError) -> Self {
        Self::MaterializationFailure {
            offset: err.offset,
            hash: err.hash,
            source: err.source,
        }
    }
}

/// Derives `(idx, pack)` paths from either one of them.
pub fn pack_paths(path: &Path) -> Result<(PathBuf, PathBuf), VerifyError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("idx") => Ok((path.to_path_buf(), path.with_extension("pack"))),
        Some("pack") => Ok((path.with_extension("idx"), path.to_path_buf())),
        _ => Err(VerifyError::InvalidFileName {
            path: path.to_path_buf(),
        }),
    }
}

/// The index and pack of one run, mapped read-only.
#[derive(Debug)]
pub struct PackFiles {
    pub idx_path: PathBuf,
    pub pack_path: PathBuf,
    pub idx: BytesView,
    pub pack: BytesView,
}

impl PackFiles {
    pub fn open(path: &Path) -> Result<Self, VerifyError> {
        let (idx_path, pack_path) = pack_paths(path)?;
        let idx = open_view(&idx_path)?;
        let pack = open_view(&pack_path)?;
        Ok(Self {
            idx_path,
            pack_path,
            idx,
            pack,
        })
    }
}

fn open_view(path: &Path) -> Result<BytesView, VerifyError> {
    BytesView::open(path).map_err(|source| VerifyError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Outcome of a successful run: one record per object in offset order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyRun {
    records: Vec<ObjectRecord>,
}

impl VerifyRun {
    #[must_use]
    pub fn records(&self) -> &[ObjectRecord] {
        &self.records
    }

    #[must_use]
    pub fn report(&self) -> Report<'_> {
        Report::new(&self.records)
    }
}

/// Runs every phase over in-memory index and pack bytes.
pub fn verify_bytes(
    idx: &[u8],
    pack: &[u8],
    options: &VerifyOptions,
) -> Result<VerifyRun, VerifyError> {
    let format = options.format;
    let index = PackIndex::parse(idx, format)?;
    debug!(objects = index.object_count(), %format, "index decoded");

    let decoder = HeaderDecoder::new(pack, format, options.limits.max_header_bytes)
        .map_err(VerifyError::InvalidPackHeader)?;
    let pack_header = decoder.pack_header().map_err(VerifyError::InvalidPackHeader)?;
    if pack_header.object_count as usize != index.object_count() {
        return Err(VerifyError::PackHeaderMismatch {
            pack_count: pack_header.object_count,
            index_count: index.object_count(),
        });
    }
    let body_end = decoder.body_end();
    let mut headers = HeaderCache::new(decoder);

    let mut records = Vec::with_capacity(index.object_count());
    for entry in index.entries_by_offset() {
        let header = headers
            .header_at(entry.offset)
            .map_err(|err| VerifyError::from_header(entry.offset, err))?;
        tracing::trace!(
            offset = entry.offset,
            hash = %entry.hash,
            kind = %header.disk_type,
            "entry header"
        );
        records.push(ObjectRecord::new(
            entry.hash,
            header.disk_type,
            header.declared_size,
            entry.offset,
        ));
    }
    debug!(version = pack_header.version, records = records.len(), "headers decoded");

    assign_packed_sizes(&mut records, pack.len() as u64, format.trailer_len())?;

    walk_chains(&mut records, &mut headers, &index)?;
    debug!(
        deltas = records.iter().filter(|r| r.is_delta()).count(),
        "delta chains walked"
    );

    {
        let mut objects = PackObjects::new(pack, body_end, &mut headers, &index, options.limits);
        resolve_types(&mut records, &mut objects)?;
    }
    debug!(headers_decoded = headers.decoded(), "types resolved");

    Ok(VerifyRun { records })
}

/// Opens the files named by `path` and verifies them.
pub fn verify_pack(path: &Path, options: &VerifyOptions) -> Result<VerifyRun, VerifyError> {
    let files = PackFiles::open(path)?;
    debug!(idx = %files.idx_path.display(), pack = %files.pack_path.display(), "verifying pack");
    verify_bytes(files.idx.as_slice(), files.pack.as_slice(), options)
}

/// Verifies and writes the report for `path` to `out`.
///
/// Nothing is written unless verification succeeds.
pub fn verify_pack_to<W: Write>(
    path: &Path,
    options: &VerifyOptions,
    out: &mut W,
) -> Result<VerifyRun, VerifyError> {
    let run = verify_pack(path, options)?;
    run.report()
        .write(out, path, options.verbose)
        .and_then(|()| out.flush())
        .map_err(VerifyError::Output)?;
    Ok(run)
}
