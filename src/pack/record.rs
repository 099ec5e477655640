//! Per-object verification record.

use super::header::{DiskType, ObjectKind};
use super::object_id::ObjectId;

/// One stored object, enriched phase by phase during a run.
///
/// Created from an index entry plus its decoded header; `packed_size`,
/// `depth`/`base_hash` and `resolved_type` are filled by the span, chain
/// and type-resolution phases respectively.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectRecord {
    pub hash: ObjectId,
    pub disk_type: DiskType,
    /// Logical type after delta application; `None` until resolved.
    pub resolved_type: Option<ObjectKind>,
    /// Header size field. For deltas this is the delta payload size.
    pub declared_size: u64,
    pub offset: u64,
    /// Bytes of header plus compressed payload.
    pub packed_size: u64,
    /// Delta applications needed to materialize; 0 for literal objects.
    pub depth: u32,
    /// Immediate base; `None` for literal objects.
    pub base_hash: Option<ObjectId>,
}

impl ObjectRecord {
    #[must_use]
    pub fn new(hash: ObjectId, disk_type: DiskType, declared_size: u64, offset: u64) -> Self {
        Self {
            hash,
            disk_type,
            resolved_type: None,
            declared_size,
            offset,
            packed_size: 0,
            depth: 0,
            base_hash: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_delta(&self) -> bool {
        self.disk_type.is_delta()
    }
}
