//! Random-access reads over pack bytes.
//!
//! Header decoding goes through `read_at` so it only ever touches the
//! handful of bytes at an entry's start; the compressed payload is never
//! read on that path.

use thiserror::Error;

use super::bytes::BytesView;

/// Errors produced by pack readers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PackReadError {
    /// The read started past the end of the data.
    #[error("read out of range at {offset} (len {len})")]
    OutOfRange { offset: u64, len: u64 },
    /// The reader returned fewer bytes than requested.
    #[error("short read: expected {expected}, got {got}")]
    ShortRead { expected: usize, got: usize },
}

/// Read-only, seekable pack byte source.
pub trait PackReader {
    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads bytes starting at `offset` into `dst`.
    ///
    /// Returns the number of bytes read, which is less than `dst.len()` only
    /// when the data ends first. Reading at exactly `len()` yields 0.
    fn read_at(&self, offset: u64, dst: &mut [u8]) -> Result<usize, PackReadError>;

    /// Fills `dst` completely or returns `ShortRead`.
    fn read_exact_at(&self, offset: u64, dst: &mut [u8]) -> Result<(), PackReadError> {
        if dst.is_empty() {
            return Ok(());
        }
        let got = self.read_at(offset, dst)?;
        if got != dst.len() {
            return Err(PackReadError::ShortRead {
                expected: dst.len(),
                got,
            });
        }
        Ok(())
    }
}

fn read_slice_at(bytes: &[u8], offset: u64, dst: &mut [u8]) -> Result<usize, PackReadError> {
    let len = bytes.len() as u64;
    if offset > len {
        return Err(PackReadError::OutOfRange { offset, len });
    }
    let available = &bytes[offset as usize..];
    let n = available.len().min(dst.len());
    dst[..n].copy_from_slice(&available[..n]);
    Ok(n)
}

impl PackReader for [u8] {
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }

    fn read_at(&self, offset: u64, dst: &mut [u8]) -> Result<usize, PackReadError> {
        read_slice_at(self, offset, dst)
    }
}

impl<T: PackReader + ?Sized> PackReader for &T {
    fn len(&self) -> u64 {
        (**self).len()
    }

    fn read_at(&self, offset: u64, dst: &mut [u8]) -> Result<usize, PackReadError> {
        (**self).read_at(offset, dst)
    }
}

impl PackReader for BytesView {
    fn len(&self) -> u64 {
        BytesView::len(self) as u64
    }

    fn read_at(&self, offset: u64, dst: &mut [u8]) -> Result<usize, PackReadError> {
        read_slice_at(self.as_slice(), offset, dst)
    }
}
