//! Delta chain walking.
//!
//! For every delta record, follows base references back to the first
//! literal object and records the chain depth plus the *immediate* base.
//! Depth counts the delta applications needed to materialize the object:
//! `depth(d) = 1 + depth(base)` with literal objects at depth 0.
//!
//! # Invariants
//! - Every hop lands on an object of this pack; a hash not in the index or
//!   a relative offset that is not an entry boundary is an error, never a
//!   truncated depth.
//! - A chain that revisits an entry is reported as a cycle.
//! - Depths are memoized per offset within one walk, so shared chain
//!   prefixes are followed once.

use std::collections::{HashMap, HashSet};
use std::fmt;

use thiserror::Error;

use super::header::{DeltaBase, HeaderError, HeaderSource, RawHeader};
use super::index::PackIndex;
use super::object_id::ObjectId;
use super::record::ObjectRecord;

/// Why a delta base could not be resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnresolvedBase {
    /// REF_DELTA names an object that is not in this pack.
    MissingHash(ObjectId),
    /// OFS_DELTA distance points before the start of the pack.
    OffsetUnderflow { offset: u64, distance: u64 },
    /// OFS_DELTA lands inside the pack but not on an entry boundary.
    NotAnEntry { base_offset: u64 },
    /// The chain returned to an entry already on it.
    Cycle { offset: u64 },
}

impl fmt::Display for UnresolvedBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHash(hash) => write!(f, "base {hash} not found in pack"),
            Self::OffsetUnderflow { offset, distance } => write!(
                f,
                "base distance {distance} from offset {offset} points before the pack start"
            ),
            Self::NotAnEntry { base_offset } => {
                write!(f, "base offset {base_offset} is not an object boundary")
            }
            Self::Cycle { offset } => write!(f, "delta chain cycles through offset {offset}"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    /// The chain starting at `offset` (object `hash`) cannot be resolved.
    #[error("unresolved delta base for {hash} at offset {offset}: {reason}")]
    Unresolved {
        offset: u64,
        hash: ObjectId,
        reason: UnresolvedBase,
    },
    #[error("reading header at offset {offset}: {source}")]
    Header {
        offset: u64,
        #[source]
        source: HeaderError,
    },
}

/// Resolves a delta's immediate base reference to `(hash, offset)`.
pub fn resolve_base(
    offset: u64,
    base: DeltaBase,
    index: &PackIndex,
) -> Result<(ObjectId, u64), UnresolvedBase> {
    match base {
        DeltaBase::ByHash(hash) => index
            .lookup_by_hash(&hash)
            .map(|base_offset| (hash, base_offset))
            .ok_or(UnresolvedBase::MissingHash(hash)),
        DeltaBase::ByRelativeOffset(distance) => {
            let base_offset = offset
                .checked_sub(distance)
                .ok_or(UnresolvedBase::OffsetUnderflow { offset, distance })?;
            index
                .lookup_by_offset(base_offset)
                .map(|hash| (hash, base_offset))
                .ok_or(UnresolvedBase::NotAnEntry { base_offset })
        }
    }
}

/// Fills `depth` and `base_hash` on every delta record.
///
/// Literal records are left at depth 0 with no base.
pub fn walk_chains<H: HeaderSource>(
    records: &mut [ObjectRecord],
    headers: &mut H,
    index: &PackIndex,
) -> Result<(), ChainError> {
    let mut depth_at: HashMap<u64, u32> = HashMap::new();

    for record in records.iter_mut().filter(|r| r.is_delta()) {
        let (origin, origin_hash) = (record.offset, record.hash);
        let unresolved = |reason| ChainError::Unresolved {
            offset: origin,
            hash: origin_hash,
            reason,
        };

        let Some(base) = read(headers, origin)?.base else {
            continue;
        };
        let (base_hash, base_offset) = resolve_base(origin, base, index).map_err(unresolved)?;

        let mut depth: u32 = 1;
        let mut current = base_offset;
        let mut visited = HashSet::from([origin]);
        loop {
            if let Some(&known) = depth_at.get(&current) {
                depth += known;
                break;
            }
            let Some(next_base) = read(headers, current)?.base else {
                break;
            };
            if !visited.insert(current) {
                return Err(unresolved(UnresolvedBase::Cycle { offset: current }));
            }
            let (_, next) = resolve_base(current, next_base, index).map_err(unresolved)?;
            depth += 1;
            current = next;
        }

        tracing::trace!(offset = origin, depth, base = %base_hash, "delta chain");
        depth_at.insert(origin, depth);
        record.depth = depth;
        record.base_hash = Some(base_hash);
    }
    Ok(())
}

fn read<H: HeaderSource>(headers: &mut H, offset: u64) -> Result<RawHeader, ChainError> {
    headers
        .header_at(offset)
        .map_err(|source| ChainError::Header { offset, source })
}
