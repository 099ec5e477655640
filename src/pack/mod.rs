//! Git pack verification and delta-chain analysis.
//!
//! Given a `.pack` file and its `.idx` v2 index, a verification run
//! enumerates every stored object in offset order, decodes its entry
//! header, accounts its on-disk span, walks delta chains back to their
//! literal roots and resolves every object's logical type by a full
//! decode. The result renders as a `git verify-pack -v` compatible report.
//!
//! # Pipeline
//! `PackIndex -> entry headers -> spans -> chains -> resolved types -> Report`
//!
//! # Invariants
//! - Records are in strictly increasing offset order.
//! - Packed sizes partition the pack body between the 12-byte file header
//!   and the checksum trailer.
//! - `depth(delta) = 1 + depth(base)`; literal objects have depth 0.
//! - A resolved type is never a delta tag.
//! - Checksums are not verified; the trailer width only affects spans.

pub mod bytes;
pub mod chain;
pub mod delta;
pub mod header;
pub mod index;
pub mod inflate;
pub mod limits;
pub mod object_id;
pub mod reader;
pub mod record;
pub mod report;
pub mod resolve;
pub mod span;
pub mod verify;

#[doc(hidden)]
pub mod test_utils;

pub use bytes::BytesView;
pub use chain::{walk_chains, ChainError, UnresolvedBase};
pub use delta::{apply_delta, DeltaError};
pub use header::{
    DeltaBase, DiskType, HeaderCache, HeaderDecoder, HeaderError, HeaderSource, ObjectKind,
    PackHeader, RawHeader, PACK_HEADER_LEN,
};
pub use index::{IdxError, IndexEntry, PackIndex};
pub use inflate::{InflateError, Inflater};
pub use limits::DecodeLimits;
pub use object_id::{ObjectFormat, ObjectId, ParseObjectIdError};
pub use reader::{PackReadError, PackReader};
pub use record::ObjectRecord;
pub use report::Report;
pub use resolve::{resolve_types, MaterializeError, Materialized, PackObjects, ResolveError};
pub use span::{assign_packed_sizes, SpanError};
pub use verify::{
    pack_paths, verify_bytes, verify_pack, verify_pack_to, PackFiles, VerifyError,
    VerifyOptions, VerifyRun,
};
