//! Read-only byte views over pack and index files.
//!
//! Files are memory-mapped on the normal path; tests and empty files use
//! owned bytes instead. Clones share the same backing storage, and the
//! mapping is released when the last clone drops.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

/// Read-only byte view backed by an mmap or owned bytes.
#[derive(Clone, Debug)]
pub struct BytesView {
    inner: BytesInner,
}

#[derive(Clone, Debug)]
enum BytesInner {
    Mmap(Arc<Mmap>),
    Owned(Arc<[u8]>),
}

impl BytesView {
    /// Maps `path` read-only.
    ///
    /// Zero-length files cannot be mapped on every platform, so they are
    /// represented as an empty owned buffer.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len == 0 {
            return Ok(Self::from_vec(Vec::new()));
        }
        // SAFETY: pack and index files are not modified while a verification
        // run holds them open.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            inner: BytesInner::Mmap(Arc::new(mmap)),
        })
    }

    #[must_use]
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            inner: BytesInner::Owned(Arc::from(bytes)),
        }
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        match &self.inner {
            BytesInner::Mmap(mmap) => mmap.as_ref(),
            BytesInner::Owned(bytes) => bytes.as_ref(),
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl AsRef<[u8]> for BytesView {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}
