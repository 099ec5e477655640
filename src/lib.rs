//! Git pack file verification with delta-chain statistics.
//!
//! ## Scope
//! Reads a pack and its v2 index, checks that every indexed entry decodes,
//! that every delta chain ends at a literal object inside the same pack and
//! that every object materializes. Reports per-object encoding, sizes and
//! chain depth in the `git verify-pack -v` layout.
//!
//! ## Key invariants
//! - Work is bounded by explicit limits: header bytes, inflated object
//!   size, delta chain length and base cache bytes (`DecodeLimits`).
//! - Header decoding never inflates payloads.
//! - Output is produced only after every phase succeeds.
//!
//! ## Notable entry points
//! - `verify_pack` / `verify_pack_to`: verify files on disk.
//! - `verify_bytes`: verify in-memory index and pack bytes.
//! - `PackIndex`, `HeaderDecoder`, `PackObjects`: the individual phases.

pub mod pack;

pub use pack::{
    verify_bytes, verify_pack, verify_pack_to, DecodeLimits, ObjectFormat, ObjectId,
    ObjectKind, ObjectRecord, Report, VerifyError, VerifyOptions, VerifyRun,
};
