//! Packed-size accounting.
//!
//! An entry's on-disk span runs from its offset to the next entry's
//! offset; the last entry runs to the start of the checksum trailer. The
//! spans partition the pack body, so their sum plus the pack header plus
//! the trailer equals the file size.

use thiserror::Error;

use super::record::ObjectRecord;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpanError {
    #[error("offsets not strictly increasing: {offset} followed by {next}")]
    NotAscending { offset: u64, next: u64 },
    #[error("object at offset {offset} leaves no room for the {trailer_len}-byte trailer in a {file_size}-byte pack")]
    PastTrailer {
        offset: u64,
        file_size: u64,
        trailer_len: u64,
    },
}

/// Fills `packed_size` for records already sorted by offset.
pub fn assign_packed_sizes(
    records: &mut [ObjectRecord],
    file_size: u64,
    trailer_len: u64,
) -> Result<(), SpanError> {
    for i in 1..records.len() {
        let (offset, next) = (records[i - 1].offset, records[i].offset);
        if next <= offset {
            return Err(SpanError::NotAscending { offset, next });
        }
        records[i - 1].packed_size = next - offset;
    }

    if let Some(last) = records.last_mut() {
        last.packed_size = file_size
            .checked_sub(trailer_len)
            .and_then(|end| end.checked_sub(last.offset))
            .filter(|&size| size > 0)
            .ok_or(SpanError::PastTrailer {
                offset: last.offset,
                file_size,
                trailer_len,
            })?;
    }
    Ok(())
}
