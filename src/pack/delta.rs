//! Git delta application.
//!
//! A delta stream starts with two varints (base size, result size) and is
//! followed by copy and insert instructions. Both sizes are validated: the
//! base must match exactly and the result must be produced exactly.
//!
//! See `gitformat-pack(5)`, "Deltified representation".

use thiserror::Error;

use super::inflate::MAX_PREALLOC;

/// Delta apply error taxonomy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeltaError {
    #[error("delta truncated")]
    Truncated,
    #[error("delta varint overflow")]
    VarintOverflow,
    #[error("delta expects base of {expected} bytes, base has {actual}")]
    BaseSizeMismatch { expected: u64, actual: usize },
    #[error("delta result size {declared} exceeds cap {max}")]
    ResultTooLarge { declared: u64, max: usize },
    #[error("delta produced {produced} bytes, header declared {declared}")]
    ResultSizeMismatch { declared: usize, produced: usize },
    #[error("delta command zero")]
    BadCommandZero,
    #[error("delta copy [{offset}, +{size}) outside base of {base_len} bytes")]
    CopyOutOfRange {
        offset: usize,
        size: usize,
        base_len: usize,
    },
}

/// Reads a delta header varint (little-endian groups of 7 bits).
fn read_varint(data: &[u8], pos: &mut usize) -> Result<u64, DeltaError> {
    let mut shift: u32 = 0;
    let mut result: u64 = 0;
    loop {
        let b = *data.get(*pos).ok_or(DeltaError::Truncated)?;
        *pos += 1;
        let bits = u64::from(b & 0x7f);
        if shift >= 64 || (bits << shift) >> shift != bits {
            return Err(DeltaError::VarintOverflow);
        }
        result |= bits << shift;
        if (b & 0x80) == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

/// Applies `delta` to `base`, writing the result into `out`.
///
/// `out` is cleared first. `max_out` caps the declared result size before
/// anything is allocated; the up-front reservation is capped further since
/// the declared size is untrusted.
pub fn apply_delta(
    base: &[u8],
    delta: &[u8],
    out: &mut Vec<u8>,
    max_out: usize,
) -> Result<(), DeltaError> {
    out.clear();
    let mut pos = 0usize;
    let base_size = read_varint(delta, &mut pos)?;
    let result_size = read_varint(delta, &mut pos)?;
    if base_size != base.len() as u64 {
        return Err(DeltaError::BaseSizeMismatch {
            expected: base_size,
            actual: base.len(),
        });
    }
    if result_size > max_out as u64 {
        return Err(DeltaError::ResultTooLarge {
            declared: result_size,
            max: max_out,
        });
    }
    let result_size = result_size as usize;
    out.reserve(result_size.min(MAX_PREALLOC));

    while pos < delta.len() {
        let cmd = delta[pos];
        pos += 1;

        let chunk = if (cmd & 0x80) != 0 {
            let (offset, size) = decode_copy_params(delta, &mut pos, cmd)?;
            let end = offset
                .checked_add(size)
                .filter(|&end| end <= base.len())
                .ok_or(DeltaError::CopyOutOfRange {
                    offset,
                    size,
                    base_len: base.len(),
                })?;
            &base[offset..end]
        } else if cmd != 0 {
            let size = cmd as usize;
            let end = pos + size;
            if end > delta.len() {
                return Err(DeltaError::Truncated);
            }
            let insert = &delta[pos..end];
            pos = end;
            insert
        } else {
            return Err(DeltaError::BadCommandZero);
        };

        if out.len() + chunk.len() > result_size {
            return Err(DeltaError::ResultSizeMismatch {
                declared: result_size,
                produced: out.len() + chunk.len(),
            });
        }
        out.extend_from_slice(chunk);
    }

    if out.len() != result_size {
        return Err(DeltaError::ResultSizeMismatch {
            declared: result_size,
            produced: out.len(),
        });
    }
    Ok(())
}

/// Decodes offset and size for a copy instruction.
///
/// Bits 0-3 of `cmd` select which little-endian offset bytes follow, bits
/// 4-6 select size bytes. A zero size encodes 0x10000.
fn decode_copy_params(
    delta: &[u8],
    pos: &mut usize,
    cmd: u8,
) -> Result<(usize, usize), DeltaError> {
    let mut take = |present: bool, shift: u32| -> Result<usize, DeltaError> {
        if !present {
            return Ok(0);
        }
        let b = *delta.get(*pos).ok_or(DeltaError::Truncated)?;
        *pos += 1;
        Ok((b as usize) << shift)
    };

    let mut offset = 0usize;
    for i in 0..4 {
        offset |= take(cmd & (1 << i) != 0, 8 * i)?;
    }
    let mut size = 0usize;
    for i in 0..3 {
        size |= take(cmd & (0x10 << i) != 0, 8 * i)?;
    }
    if size == 0 {
        size = 0x10000;
    }
    Ok((offset, size))
}
