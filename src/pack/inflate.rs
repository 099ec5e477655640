//! Bounded zlib inflation for pack entry payloads.
//!
//! Every pack entry carries its inflated size in the header, so inflation
//! is always exact: the stream must produce precisely the declared number
//! of bytes. Output is capped before any byte is appended, so a corrupt
//! size field cannot drive an unbounded allocation. Streams whose output
//! is not needed can be checked with `inflate_discard`, which holds no
//! more than the scratch buffer.

use flate2::{Decompress, FlushDecompress, Status};
use thiserror::Error;

/// Internal inflate buffer size.
const INFLATE_BUF_SIZE: usize = 64 * 1024;
/// Output preallocation cap; declared sizes are untrusted.
pub(crate) const MAX_PREALLOC: usize = 16 * INFLATE_BUF_SIZE;

/// Inflate error taxonomy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InflateError {
    #[error("inflated data exceeds {max} bytes")]
    LimitExceeded { max: usize },
    #[error("zlib stream ended after {got} of {expected} bytes")]
    TruncatedInput { expected: usize, got: usize },
    #[error("inflate stalled")]
    Stalled,
    #[error("zlib stream is corrupt")]
    Backend,
}

/// Reusable zlib state plus scratch buffer.
///
/// One `Inflater` serves a whole verification run; it is reset before
/// each stream.
pub struct Inflater {
    de: Decompress,
    buf: Box<[u8]>,
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Inflater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inflater").finish_non_exhaustive()
    }
}

impl Inflater {
    #[must_use]
    pub fn new() -> Self {
        Self {
            de: Decompress::new(true),
            buf: vec![0u8; INFLATE_BUF_SIZE].into_boxed_slice(),
        }
    }

    /// Inflates a zlib stream that must produce exactly `expected` bytes.
    ///
    /// `out` is cleared first. Returns the number of input bytes consumed,
    /// which is the compressed length of the entry payload. Trailing bytes
    /// in `input` after the stream end are ignored.
    pub fn inflate_exact(
        &mut self,
        input: &[u8],
        out: &mut Vec<u8>,
        expected: usize,
    ) -> Result<usize, InflateError> {
        out.clear();
        out.reserve(expected.min(MAX_PREALLOC));
        self.run(input, expected, |chunk| out.extend_from_slice(chunk))
    }

    /// Checks that a zlib stream inflates to exactly `expected` bytes
    /// without keeping them. Memory use is the scratch buffer only.
    pub fn inflate_discard(
        &mut self,
        input: &[u8],
        expected: usize,
    ) -> Result<usize, InflateError> {
        self.run(input, expected, |_| {})
    }

    fn run(
        &mut self,
        input: &[u8],
        expected: usize,
        mut sink: impl FnMut(&[u8]),
    ) -> Result<usize, InflateError> {
        self.de.reset(true);

        let mut in_pos = 0usize;
        let mut total = 0usize;
        loop {
            let before_in = self.de.total_in();
            let before_out = self.de.total_out();

            let status = self
                .de
                .decompress(&input[in_pos..], &mut self.buf[..], FlushDecompress::None)
                .map_err(|_| InflateError::Backend)?;

            let consumed = (self.de.total_in() - before_in) as usize;
            let produced = (self.de.total_out() - before_out) as usize;
            in_pos += consumed;

            if produced != 0 {
                if produced > expected - total {
                    return Err(InflateError::LimitExceeded { max: expected });
                }
                sink(&self.buf[..produced]);
                total += produced;
            }

            match status {
                Status::StreamEnd => {
                    if total != expected {
                        return Err(InflateError::TruncatedInput {
                            expected,
                            got: total,
                        });
                    }
                    return Ok(in_pos);
                }
                Status::Ok | Status::BufError => {
                    if consumed == 0 && produced == 0 {
                        if in_pos >= input.len() {
                            return Err(InflateError::TruncatedInput {
                                expected,
                                got: total,
                            });
                        }
                        return Err(InflateError::Stalled);
                    }
                }
            }
        }
    }
}
