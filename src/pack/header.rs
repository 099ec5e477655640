//! Pack file and entry header decoding.
//!
//! Parses the 12-byte pack header and the variable-length header at the
//! start of each entry: type tag, declared size and, for deltas, the base
//! reference. Only header bytes are read; payloads stay compressed.
//!
//! # Entry header layout
//! ```text
//! byte 0:  [C][T T T][S S S S]      C = continuation, T = type, S = size bits 0..4
//! byte n:  [C][S S S S S S S]       further size bits, little-endian groups of 7
//! OFS_DELTA: base distance, big-endian groups of 7 with +1 bias per group
//! REF_DELTA: base object ID, `hash_len` raw bytes
//! ```
//!
//! The trailing checksum is excluded from the addressable body so it can
//! never be misread as an entry.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use super::object_id::{ObjectFormat, ObjectId};
use super::reader::{PackReadError, PackReader};

/// Pack header size: magic(4) + version(4) + object_count(4).
pub const PACK_HEADER_LEN: u64 = 12;

/// Upper bound on entry header length: 1 type byte, 9 size bytes and a
/// 32-byte hash leave headroom inside this buffer.
pub const MAX_ENTRY_HEADER_LEN: usize = 64;

/// Maximum OFS_DELTA distance encoding bytes.
const MAX_OFS_BYTES: usize = 10; // ceil(64/7)

/// Logical object type, the only types an object can have once any delta
/// has been applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Tree => "tree",
            Self::Blob => "blob",
            Self::Tag => "tag",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type tag as encoded in an entry header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiskType {
    Commit,
    Tree,
    Blob,
    Tag,
    OfsDelta,
    RefDelta,
}

impl DiskType {
    /// Maps a 3-bit header tag. Tags 0 and 5 are reserved.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Commit),
            2 => Some(Self::Tree),
            3 => Some(Self::Blob),
            4 => Some(Self::Tag),
            6 => Some(Self::OfsDelta),
            7 => Some(Self::RefDelta),
            _ => None,
        }
    }

    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Commit => 1,
            Self::Tree => 2,
            Self::Blob => 3,
            Self::Tag => 4,
            Self::OfsDelta => 6,
            Self::RefDelta => 7,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_delta(self) -> bool {
        matches!(self, Self::OfsDelta | Self::RefDelta)
    }

    /// The logical kind for literal entries; `None` for deltas.
    #[must_use]
    pub const fn object_kind(self) -> Option<ObjectKind> {
        match self {
            Self::Commit => Some(ObjectKind::Commit),
            Self::Tree => Some(ObjectKind::Tree),
            Self::Blob => Some(ObjectKind::Blob),
            Self::Tag => Some(ObjectKind::Tag),
            Self::OfsDelta | Self::RefDelta => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Tree => "tree",
            Self::Blob => "blob",
            Self::Tag => "tag",
            Self::OfsDelta => "ofs-delta",
            Self::RefDelta => "ref-delta",
        }
    }
}

impl From<ObjectKind> for DiskType {
    fn from(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Commit => Self::Commit,
            ObjectKind::Tree => Self::Tree,
            ObjectKind::Blob => Self::Blob,
            ObjectKind::Tag => Self::Tag,
        }
    }
}

impl fmt::Display for DiskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference from a delta entry to its base.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaBase {
    /// REF_DELTA: base named by object ID.
    ByHash(ObjectId),
    /// OFS_DELTA: base starts `distance` bytes before this entry.
    ByRelativeOffset(u64),
}

/// Decoded entry header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawHeader {
    pub disk_type: DiskType,
    /// Inflated payload size; for deltas this is the delta stream size,
    /// not the size of the reconstructed object.
    pub declared_size: u64,
    /// Present exactly when `disk_type` is a delta.
    pub base: Option<DeltaBase>,
    /// Pack offset where the zlib stream begins.
    pub data_start: u64,
}

/// Parsed 12-byte pack file header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackHeader {
    pub version: u32,
    pub object_count: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("pack too small: {len} bytes (need at least {min})")]
    PackTooSmall { len: u64, min: u64 },
    #[error("bad pack signature")]
    BadSignature,
    #[error("unsupported pack version {0}")]
    UnsupportedVersion(u32),
    #[error("offset {offset} outside pack body [12, {body_end})")]
    SeekFailure { offset: u64, body_end: u64 },
    #[error("entry header at offset {offset} truncated by end of pack data")]
    Truncated { offset: u64 },
    #[error("entry header at offset {offset} exceeds {max} bytes")]
    TooLong { offset: u64, max: usize },
    #[error("entry size at offset {offset} overflows 64 bits")]
    SizeOverflow { offset: u64 },
    #[error("OFS_DELTA distance at offset {offset} overflows 64 bits")]
    OfsOverflow { offset: u64 },
    #[error("invalid object type {tag} at offset {offset}")]
    InvalidObjectType { offset: u64, tag: u8 },
    #[error(transparent)]
    Read(#[from] PackReadError),
}

/// Reads entry headers at arbitrary pack offsets.
#[derive(Debug)]
pub struct HeaderDecoder<R> {
    reader: R,
    format: ObjectFormat,
    body_end: u64,
    max_header_bytes: usize,
}

impl<R: PackReader> HeaderDecoder<R> {
    /// Wraps `reader`, reserving the trailing `format.trailer_len()` bytes.
    ///
    /// `max_header_bytes` is clamped to `MAX_ENTRY_HEADER_LEN`.
    pub fn new(
        reader: R,
        format: ObjectFormat,
        max_header_bytes: usize,
    ) -> Result<Self, HeaderError> {
        let len = reader.len();
        let min = PACK_HEADER_LEN + format.trailer_len();
        if len < min {
            return Err(HeaderError::PackTooSmall { len, min });
        }
        Ok(Self {
            reader,
            format,
            body_end: len - format.trailer_len(),
            max_header_bytes: max_header_bytes.clamp(1, MAX_ENTRY_HEADER_LEN),
        })
    }

    /// Parses the file header: `PACK`, version 2 or 3, object count.
    pub fn pack_header(&self) -> Result<PackHeader, HeaderError> {
        let mut buf = [0u8; PACK_HEADER_LEN as usize];
        self.reader.read_exact_at(0, &mut buf)?;
        if &buf[0..4] != b"PACK" {
            return Err(HeaderError::BadSignature);
        }
        let version = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        if version != 2 && version != 3 {
            return Err(HeaderError::UnsupportedVersion(version));
        }
        let object_count = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);
        Ok(PackHeader {
            version,
            object_count,
        })
    }

    /// Decodes the entry header at `offset`.
    pub fn read_header(&self, offset: u64) -> Result<RawHeader, HeaderError> {
        if offset < PACK_HEADER_LEN || offset >= self.body_end {
            return Err(HeaderError::SeekFailure {
                offset,
                body_end: self.body_end,
            });
        }

        let mut buf = [0u8; MAX_ENTRY_HEADER_LEN];
        let want = (self.body_end - offset).min(self.max_header_bytes as u64) as usize;
        let got = self.reader.read_at(offset, &mut buf[..want])?;
        let mut cur = HeaderCursor {
            bytes: &buf[..got],
            pos: 0,
            offset,
            at_end: got < self.max_header_bytes,
            max: self.max_header_bytes,
        };

        let first = cur.next()?;
        let tag = (first >> 4) & 0x07;
        let mut size = u64::from(first & 0x0f);
        let mut shift: u32 = 4;
        let mut byte = first;
        while (byte & 0x80) != 0 {
            byte = cur.next()?;
            let bits = u64::from(byte & 0x7f);
            if shift >= 64 || (bits << shift) >> shift != bits {
                return Err(HeaderError::SizeOverflow { offset });
            }
            size |= bits << shift;
            shift += 7;
        }

        let disk_type =
            DiskType::from_tag(tag).ok_or(HeaderError::InvalidObjectType { offset, tag })?;
        let base = match disk_type {
            DiskType::OfsDelta => Some(DeltaBase::ByRelativeOffset(cur.ofs_distance()?)),
            DiskType::RefDelta => {
                let raw = cur.take(self.format.hash_len())?;
                let id = ObjectId::from_slice(raw).ok_or(HeaderError::Truncated { offset })?;
                Some(DeltaBase::ByHash(id))
            }
            _ => None,
        };

        Ok(RawHeader {
            disk_type,
            declared_size: size,
            base,
            data_start: offset + cur.pos as u64,
        })
    }

    /// End of the addressable body (file length minus trailer).
    #[inline]
    pub fn body_end(&self) -> u64 {
        self.body_end
    }
}

struct HeaderCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    offset: u64,
    /// True when `bytes` was cut short by the end of the pack body rather
    /// than by the header length bound.
    at_end: bool,
    max: usize,
}

impl<'a> HeaderCursor<'a> {
    fn exhausted(&self) -> HeaderError {
        if self.at_end {
            HeaderError::Truncated {
                offset: self.offset,
            }
        } else {
            HeaderError::TooLong {
                offset: self.offset,
                max: self.max,
            }
        }
    }

    fn next(&mut self) -> Result<u8, HeaderError> {
        let b = *self.bytes.get(self.pos).ok_or_else(|| self.exhausted())?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], HeaderError> {
        let end = self.pos + n;
        if end > self.bytes.len() {
            return Err(self.exhausted());
        }
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// OFS_DELTA distance; see `gitformat-pack(5)`.
    fn ofs_distance(&mut self) -> Result<u64, HeaderError> {
        let mut c = self.next()?;
        let mut val = u64::from(c & 0x7f);
        let mut read = 1usize;
        while (c & 0x80) != 0 {
            if read >= MAX_OFS_BYTES {
                return Err(HeaderError::OfsOverflow {
                    offset: self.offset,
                });
            }
            c = self.next()?;
            read += 1;
            val = val
                .checked_add(1)
                .and_then(|v| v.checked_mul(128))
                .ok_or(HeaderError::OfsOverflow {
                    offset: self.offset,
                })?
                | u64::from(c & 0x7f);
        }
        Ok(val)
    }
}

/// Source of decoded entry headers, keyed by pack offset.
pub trait HeaderSource {
    fn header_at(&mut self, offset: u64) -> Result<RawHeader, HeaderError>;
}

impl<R: PackReader> HeaderSource for HeaderDecoder<R> {
    fn header_at(&mut self, offset: u64) -> Result<RawHeader, HeaderError> {
        self.read_header(offset)
    }
}

/// Header decoder that remembers every header it has decoded.
///
/// Span bookkeeping, chain walking and materialization all revisit the
/// same offsets; each offset is decoded once per run.
#[derive(Debug)]
pub struct HeaderCache<R> {
    decoder: HeaderDecoder<R>,
    headers: HashMap<u64, RawHeader>,
    decoded: u64,
}

impl<R: PackReader> HeaderCache<R> {
    pub fn new(decoder: HeaderDecoder<R>) -> Self {
        Self {
            decoder,
            headers: HashMap::new(),
            decoded: 0,
        }
    }

    /// Number of headers actually decoded (cache misses).
    #[inline]
    pub fn decoded(&self) -> u64 {
        self.decoded
    }
}

impl<R: PackReader> HeaderSource for HeaderCache<R> {
    fn header_at(&mut self, offset: u64) -> Result<RawHeader, HeaderError> {
        if let Some(header) = self.headers.get(&offset) {
            return Ok(*header);
        }
        let header = self.decoder.read_header(offset)?;
        self.decoded += 1;
        self.headers.insert(offset, header);
        Ok(header)
    }
}
