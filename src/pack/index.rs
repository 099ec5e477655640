//! Pack index (`.idx`) v2 decoding into an offset-ordered index model.
//!
//! The on-disk index is sorted by object ID. Verification walks objects in
//! pack order instead, so decoding produces an owned `PackIndex` that holds
//! entries sorted by offset plus lookup maps in both directions.
//!
//! # Scope
//! - Supports pack index version 2 only.
//! - Validates header, fanout monotonicity, table sizes, strict hash order
//!   and large-offset indirection.
//! - Does **not** validate checksums; the CRC table is sized but not read.
//!
//! # Layout (v2 format)
//! ```text
//! +----------------+
//! | Magic (4B)     |  0xff 't' 'O' 'c'
//! | Version (4B)   |  Big-endian 2
//! +----------------+
//! | Fanout (1024B) |  256 * u32 BE cumulative counts
//! +----------------+
//! | OID Table      |  N * hash_len bytes (sorted)
//! +----------------+
//! | CRC Table      |  N * 4 bytes
//! +----------------+
//! | Offset Table   |  N * 4 bytes (MSB=1 -> large offset)
//! +----------------+
//! | Large Offsets  |  M * 8 bytes (optional)
//! +----------------+
//! | Pack Checksum  |  hash_len bytes
//! | Idx Checksum   |  hash_len bytes
//! +----------------+
//! ```

use std::collections::HashMap;

use thiserror::Error;

use super::object_id::{ObjectFormat, ObjectId};

/// Pack index magic bytes for v2 format.
pub const IDX_MAGIC: [u8; 4] = [0xff, b't', b'O', b'c'];
/// Pack index version 2 (only supported version).
pub const IDX_VERSION: u32 = 2;
const IDX_HEADER_SIZE: usize = 8;
const FANOUT_ENTRIES: usize = 256;
const FANOUT_SIZE: usize = FANOUT_ENTRIES * 4;
/// MSB mask for detecting large offset indirection.
pub const LARGE_OFFSET_FLAG: u32 = 0x8000_0000;

/// Errors from pack index decoding.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum IdxError {
    #[error("corrupt pack index: {detail}")]
    Corrupt { detail: &'static str },
    #[error("unsupported pack index version: {version} (expected 2)")]
    UnsupportedVersion { version: u32 },
    #[error("pack index tables need {needed} bytes for {count} {format} objects, file has {actual}")]
    SizeMismatch {
        format: ObjectFormat,
        count: u32,
        needed: usize,
        actual: usize,
    },
    #[error("large offset index out of bounds: {index} >= {count}")]
    LargeOffsetOutOfBounds { index: u32, count: u32 },
    #[error("object ids not strictly ascending at position {position}")]
    UnsortedHashes { position: u32 },
    #[error("objects {first} and {second} share pack offset {offset}")]
    DuplicateOffset {
        offset: u64,
        first: ObjectId,
        second: ObjectId,
    },
}

impl IdxError {
    #[inline]
    pub const fn corrupt(detail: &'static str) -> Self {
        Self::Corrupt { detail }
    }
}

/// One index entry: object ID and where its entry header starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub hash: ObjectId,
    pub offset: u64,
}

/// Decoded pack index, ordered by pack offset.
///
/// # Invariants
/// - `entries` offsets are strictly increasing.
/// - Every hash and every offset appears exactly once.
#[derive(Debug, Clone)]
pub struct PackIndex {
    format: ObjectFormat,
    entries: Vec<IndexEntry>,
    by_hash: HashMap<ObjectId, usize>,
    by_offset: HashMap<u64, usize>,
}

impl PackIndex {
    /// Decodes a v2 index. The hash width comes from `format`, never from
    /// the file contents.
    pub fn parse(data: &[u8], format: ObjectFormat) -> Result<Self, IdxError> {
        let hash_len = format.hash_len();
        let min_size = IDX_HEADER_SIZE + FANOUT_SIZE + 2 * hash_len;
        if data.len() < min_size {
            return Err(IdxError::corrupt("file too small"));
        }
        if data[0..4] != IDX_MAGIC {
            return Err(IdxError::corrupt("invalid magic"));
        }
        let version = be_u32(&data[4..8]);
        if version != IDX_VERSION {
            return Err(IdxError::UnsupportedVersion { version });
        }

        let fanout = &data[IDX_HEADER_SIZE..IDX_HEADER_SIZE + FANOUT_SIZE];
        let count = validate_fanout(fanout)?;
        let n = count as usize;

        let oid_start = IDX_HEADER_SIZE + FANOUT_SIZE;
        let crc_start = oid_start + n * hash_len;
        let offset_start = crc_start + n * 4;
        let large_start = offset_start + n * 4;
        let needed = large_start + 2 * hash_len;
        if data.len() < needed {
            return Err(IdxError::SizeMismatch {
                format,
                count,
                needed,
                actual: data.len(),
            });
        }
        let large_end = data.len() - 2 * hash_len;
        let large_offsets = &data[large_start..large_end];
        if large_offsets.len() % 8 != 0 {
            return Err(IdxError::corrupt(
                "large offset table not multiple of 8 bytes",
            ));
        }

        let mut entries = Vec::with_capacity(n);
        let mut prev: Option<&[u8]> = None;
        for i in 0..n {
            let raw = &data[oid_start + i * hash_len..oid_start + (i + 1) * hash_len];
            if prev.is_some_and(|p| p >= raw) {
                return Err(IdxError::UnsortedHashes { position: i as u32 });
            }
            prev = Some(raw);
            let lo = match raw[0] {
                0 => 0,
                b => fanout_at(fanout, b - 1),
            };
            if !(lo..fanout_at(fanout, raw[0])).contains(&(i as u32)) {
                return Err(IdxError::corrupt("fanout disagrees with object ids"));
            }

            let hash = ObjectId::from_slice(raw).ok_or(IdxError::corrupt("bad hash width"))?;
            let raw_offset = be_u32(&data[offset_start + i * 4..offset_start + i * 4 + 4]);
            let offset = if raw_offset & LARGE_OFFSET_FLAG != 0 {
                resolve_large_offset(large_offsets, raw_offset & !LARGE_OFFSET_FLAG)?
            } else {
                u64::from(raw_offset)
            };
            entries.push(IndexEntry { hash, offset });
        }

        entries.sort_by_key(|e| e.offset);

        let mut by_hash = HashMap::with_capacity(n);
        let mut by_offset = HashMap::with_capacity(n);
        for (pos, entry) in entries.iter().enumerate() {
            by_hash.insert(entry.hash, pos);
            if by_offset.insert(entry.offset, pos).is_some() {
                return Err(IdxError::DuplicateOffset {
                    offset: entry.offset,
                    first: entries[pos - 1].hash,
                    second: entry.hash,
                });
            }
        }

        Ok(Self {
            format,
            entries,
            by_hash,
            by_offset,
        })
    }

    /// Entries in strictly ascending offset order.
    #[inline]
    pub fn entries_by_offset(&self) -> &[IndexEntry] {
        &self.entries
    }

    #[inline]
    pub fn lookup_by_hash(&self, hash: &ObjectId) -> Option<u64> {
        self.by_hash.get(hash).map(|&pos| self.entries[pos].offset)
    }

    /// Reverse lookup used to name OFS_DELTA bases. Only exact entry
    /// boundaries match.
    #[inline]
    pub fn lookup_by_offset(&self, offset: u64) -> Option<ObjectId> {
        self.by_offset.get(&offset).map(|&pos| self.entries[pos].hash)
    }

    #[inline]
    pub fn object_count(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn format(&self) -> ObjectFormat {
        self.format
    }
}

#[inline]
fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

#[inline]
fn fanout_at(fanout: &[u8], first_byte: u8) -> u32 {
    let off = first_byte as usize * 4;
    be_u32(&fanout[off..off + 4])
}

/// Validates that the fanout table is non-decreasing and returns the total
/// object count (`fanout[255]`).
fn validate_fanout(fanout: &[u8]) -> Result<u32, IdxError> {
    debug_assert!(fanout.len() == FANOUT_SIZE);
    let mut prev = 0u32;
    for chunk in fanout.chunks_exact(4) {
        let val = be_u32(chunk);
        if val < prev {
            return Err(IdxError::corrupt("fanout not monotonic"));
        }
        prev = val;
    }
    Ok(prev)
}

fn resolve_large_offset(table: &[u8], idx: u32) -> Result<u64, IdxError> {
    if table.is_empty() {
        return Err(IdxError::corrupt(
            "large offset flag but no large offset table",
        ));
    }
    let count = (table.len() / 8) as u32;
    if idx >= count {
        return Err(IdxError::LargeOffsetOutOfBounds { index: idx, count });
    }
    let start = idx as usize * 8;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&table[start..start + 8]);
    Ok(u64::from_be_bytes(raw))
}
