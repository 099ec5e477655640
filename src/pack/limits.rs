//! Decode limits for a verification run.
//!
//! Limits bound the work a corrupt or hostile pack can cause. They never
//! change the report for a well-formed pack that fits inside them.

use super::header::MAX_ENTRY_HEADER_LEN;

/// Bounds applied while decoding headers and materializing objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Maximum bytes parsed for one entry header (clamped to 64).
    pub max_header_bytes: usize,
    /// Maximum inflated size of an object or delta stream held in memory.
    /// Literals that no delta builds on are streamed and never held.
    pub max_object_bytes: usize,
    /// Maximum number of delta applications to materialize one object.
    pub max_delta_depth: u32,
    /// Budget for materialized delta bases kept between objects.
    pub base_cache_bytes: usize,
}

impl DecodeLimits {
    pub const DEFAULT_MAX_OBJECT_BYTES: usize = usize::MAX;
    pub const DEFAULT_MAX_DELTA_DEPTH: u32 = 10_000;
    pub const DEFAULT_BASE_CACHE_BYTES: usize = 64 * 1024 * 1024;

    #[must_use]
    pub const fn new(
        max_header_bytes: usize,
        max_object_bytes: usize,
        max_delta_depth: u32,
        base_cache_bytes: usize,
    ) -> Self {
        Self {
            max_header_bytes,
            max_object_bytes,
            max_delta_depth,
            base_cache_bytes,
        }
    }
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self::new(
            MAX_ENTRY_HEADER_LEN,
            Self::DEFAULT_MAX_OBJECT_BYTES,
            Self::DEFAULT_MAX_DELTA_DEPTH,
            Self::DEFAULT_BASE_CACHE_BYTES,
        )
    }
}
