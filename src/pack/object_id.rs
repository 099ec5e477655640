//! Object identifiers and hash-width selection.
//!
//! A pack carries no marker for its hash algorithm, so the width is always
//! chosen by the caller (`ObjectFormat`) and threaded through every parser.
//! The same width is used for hash-addressed delta bases, index tables and
//! the trailing pack checksum.
//!
//! # Ordering Semantics
//! `ObjectId` compares lexicographically on its populated bytes, which is
//! the order Git uses for the index hash table.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error;

/// Hash algorithm in use for a pack and its index.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ObjectFormat {
    /// SHA-1 object IDs (20 bytes).
    #[default]
    Sha1 = 1,
    /// SHA-256 object IDs (32 bytes).
    Sha256 = 2,
}

impl ObjectFormat {
    /// Byte length of an object ID in this format.
    #[inline]
    #[must_use]
    pub const fn hash_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }

    /// Hex string length for object IDs in this format.
    #[inline]
    #[must_use]
    pub const fn hex_len(self) -> usize {
        self.hash_len() * 2
    }

    /// Width of the checksum trailer appended to pack and index files.
    #[inline]
    #[must_use]
    pub const fn trailer_len(self) -> u64 {
        self.hash_len() as u64
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for ObjectFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-size storage for a SHA-1 or SHA-256 object ID.
///
/// # Invariants
/// - `len` is always 20 or 32
/// - `bytes[len..]` is always zero
#[derive(Clone, Copy)]
pub struct ObjectId {
    len: u8,
    bytes: [u8; 32],
}

impl ObjectId {
    /// Builds an ID from raw bytes, returning `None` unless the slice is
    /// exactly 20 or 32 bytes long.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 20 && bytes.len() != 32 {
            return None;
        }
        let mut storage = [0u8; 32];
        storage[..bytes.len()].copy_from_slice(bytes);
        Some(Self {
            len: bytes.len() as u8,
            bytes: storage,
        })
    }

    /// The all-zero ID for `format`.
    #[must_use]
    pub const fn null(format: ObjectFormat) -> Self {
        Self {
            len: format.hash_len() as u8,
            bytes: [0u8; 32],
        }
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    #[inline]
    #[must_use]
    pub const fn format(&self) -> ObjectFormat {
        if self.len == 20 {
            ObjectFormat::Sha1
        } else {
            ObjectFormat::Sha256
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.as_slice().iter().all(|&b| b == 0)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.as_slice() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl PartialEq for ObjectId {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for ObjectId {}

impl Hash for ObjectId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl PartialOrd for ObjectId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

/// Error parsing a hex object ID.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseObjectIdError {
    #[error("object id must be 40 or 64 hex digits, got {0}")]
    BadLength(usize),
    #[error("invalid hex digit at position {0}")]
    BadDigit(usize),
}

impl FromStr for ObjectId {
    type Err = ParseObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.as_bytes();
        if hex.len() != 40 && hex.len() != 64 {
            return Err(ParseObjectIdError::BadLength(hex.len()));
        }
        let mut storage = [0u8; 32];
        for (i, pair) in hex.chunks_exact(2).enumerate() {
            let hi = hex_value(pair[0]).ok_or(ParseObjectIdError::BadDigit(i * 2))?;
            let lo = hex_value(pair[1]).ok_or(ParseObjectIdError::BadDigit(i * 2 + 1))?;
            storage[i] = (hi << 4) | lo;
        }
        Ok(Self {
            len: (hex.len() / 2) as u8,
            bytes: storage,
        })
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
