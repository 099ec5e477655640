//! Object materialization and final type resolution.
//!
//! Materializing an object inflates its payload and, for deltas, rebuilds
//! the base first and applies the delta on top. The logical type of a
//! delta is the type of the literal object at the root of its chain, so
//! the resolved type always comes out of a full decode.
//!
//! Literal objects that only need a type are inflated in streaming mode
//! and never held, so their size is unbounded. Bases shared by many deltas
//! are kept in a small byte-bounded cache keyed by pack offset; eviction is
//! FIFO.

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use thiserror::Error;

use super::delta::{apply_delta, DeltaError};
use super::header::{DeltaBase, HeaderError, HeaderSource, ObjectKind, RawHeader};
use super::index::PackIndex;
use super::inflate::{InflateError, Inflater};
use super::limits::DecodeLimits;
use super::object_id::ObjectId;
use super::record::ObjectRecord;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaterializeError {
    #[error("header at offset {offset}: {source}")]
    Header {
        offset: u64,
        #[source]
        source: HeaderError,
    },
    #[error("inflating entry at offset {offset}: {source}")]
    Inflate {
        offset: u64,
        #[source]
        source: InflateError,
    },
    #[error("applying delta at offset {offset}: {source}")]
    Delta {
        offset: u64,
        #[source]
        source: DeltaError,
    },
    #[error("entry at offset {offset} declares {size} bytes, cap is {max}")]
    ObjectTooLarge { offset: u64, size: u64, max: usize },
    #[error("delta at offset {offset} has no reachable base")]
    MissingBase { offset: u64 },
    #[error("delta chain from offset {offset} exceeds {max} links")]
    ChainTooDeep { offset: u64, max: u32 },
}

/// A fully decoded object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Materialized {
    pub kind: ObjectKind,
    pub data: Rc<[u8]>,
}

#[derive(Debug)]
struct BaseCache {
    budget: usize,
    used: usize,
    entries: HashMap<u64, Materialized>,
    order: VecDeque<u64>,
}

impl BaseCache {
    fn new(budget: usize) -> Self {
        Self {
            budget,
            used: 0,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, offset: u64) -> Option<Materialized> {
        self.entries.get(&offset).cloned()
    }

    fn insert(&mut self, offset: u64, object: &Materialized) {
        let len = object.data.len();
        if len > self.budget || self.entries.contains_key(&offset) {
            return;
        }
        while self.used + len > self.budget {
            let Some(old) = self.order.pop_front() else {
                break;
            };
            if let Some(evicted) = self.entries.remove(&old) {
                self.used -= evicted.data.len();
            }
        }
        self.used += len;
        self.order.push_back(offset);
        self.entries.insert(offset, object.clone());
    }
}

/// Full-decode access to the objects of one pack.
#[derive(Debug)]
pub struct PackObjects<'a, H> {
    pack: &'a [u8],
    body_end: usize,
    headers: &'a mut H,
    index: &'a PackIndex,
    limits: DecodeLimits,
    inflater: Inflater,
    cache: BaseCache,
    delta_buf: Vec<u8>,
}

impl<'a, H: HeaderSource> PackObjects<'a, H> {
    /// `pack` is the whole pack file; `body_end` excludes the trailer.
    pub fn new(
        pack: &'a [u8],
        body_end: u64,
        headers: &'a mut H,
        index: &'a PackIndex,
        limits: DecodeLimits,
    ) -> Self {
        Self {
            pack,
            body_end: (body_end as usize).min(pack.len()),
            headers,
            index,
            limits,
            inflater: Inflater::new(),
            cache: BaseCache::new(limits.base_cache_bytes),
            delta_buf: Vec::new(),
        }
    }

    /// Decodes the object at `offset`, applying its whole delta chain.
    pub fn materialize(&mut self, offset: u64) -> Result<Materialized, MaterializeError> {
        // Walk down to a literal (or cached) base, remembering the deltas.
        let mut pending: Vec<(u64, RawHeader)> = Vec::new();
        let mut current = offset;
        let mut object = loop {
            if let Some(hit) = self.cache.get(current) {
                break hit;
            }
            let header = self.header(current)?;
            let Some(base) = header.base else {
                let kind = header
                    .disk_type
                    .object_kind()
                    .ok_or(MaterializeError::MissingBase { offset: current })?;
                let mut data = Vec::new();
                self.inflate_entry(current, &header, &mut data)?;
                break Materialized {
                    kind,
                    data: Rc::from(data),
                };
            };
            if pending.len() as u32 >= self.limits.max_delta_depth {
                return Err(MaterializeError::ChainTooDeep {
                    offset,
                    max: self.limits.max_delta_depth,
                });
            }
            pending.push((current, header));
            current = self.base_offset(current, base)?;
        };

        // Literal bases that feed a delta are worth keeping.
        if !pending.is_empty() {
            self.cache.insert(current, &object);
        }

        while let Some((delta_offset, header)) = pending.pop() {
            let mut delta = std::mem::take(&mut self.delta_buf);
            let inflated = self.inflate_entry(delta_offset, &header, &mut delta);
            let mut out = Vec::new();
            let applied = inflated.and_then(|()| {
                apply_delta(&object.data, &delta, &mut out, self.limits.max_object_bytes).map_err(
                    |source| MaterializeError::Delta {
                        offset: delta_offset,
                        source,
                    },
                )
            });
            self.delta_buf = delta;
            applied?;

            object = Materialized {
                kind: object.kind,
                data: Rc::from(out),
            };
            if !pending.is_empty() {
                self.cache.insert(delta_offset, &object);
            }
        }

        Ok(object)
    }

    /// Resolves the logical type of the object at `offset`.
    ///
    /// A literal is inflated without keeping its bytes, so `max_object_bytes`
    /// does not apply to it. A delta is materialized along its chain.
    pub fn resolve_kind(&mut self, offset: u64) -> Result<ObjectKind, MaterializeError> {
        if let Some(hit) = self.cache.get(offset) {
            return Ok(hit.kind);
        }
        let header = self.header(offset)?;
        if header.base.is_some() {
            return self.materialize(offset).map(|object| object.kind);
        }
        let kind = header
            .disk_type
            .object_kind()
            .ok_or(MaterializeError::MissingBase { offset })?;
        let expected = declared_len(offset, &header, usize::MAX)?;
        let input = self.payload(&header);
        self.inflater
            .inflate_discard(input, expected)
            .map_err(|source| MaterializeError::Inflate { offset, source })?;
        Ok(kind)
    }

    fn header(&mut self, offset: u64) -> Result<RawHeader, MaterializeError> {
        self.headers
            .header_at(offset)
            .map_err(|source| MaterializeError::Header { offset, source })
    }

    fn payload(&self, header: &RawHeader) -> &'a [u8] {
        let pack = self.pack;
        let start = usize::try_from(header.data_start)
            .map_or(self.body_end, |start| start.min(self.body_end));
        &pack[start..self.body_end]
    }

    fn base_offset(&self, offset: u64, base: DeltaBase) -> Result<u64, MaterializeError> {
        let found = match base {
            DeltaBase::ByHash(hash) => self.index.lookup_by_hash(&hash),
            DeltaBase::ByRelativeOffset(distance) => offset.checked_sub(distance),
        };
        found.ok_or(MaterializeError::MissingBase { offset })
    }

    fn inflate_entry(
        &mut self,
        offset: u64,
        header: &RawHeader,
        out: &mut Vec<u8>,
    ) -> Result<(), MaterializeError> {
        let expected = declared_len(offset, header, self.limits.max_object_bytes)?;
        let input = self.payload(header);
        self.inflater
            .inflate_exact(input, out, expected)
            .map(|_| ())
            .map_err(|source| MaterializeError::Inflate { offset, source })
    }
}

fn declared_len(offset: u64, header: &RawHeader, max: usize) -> Result<usize, MaterializeError> {
    usize::try_from(header.declared_size)
        .ok()
        .filter(|&size| size <= max)
        .ok_or(MaterializeError::ObjectTooLarge {
            offset,
            size: header.declared_size,
            max,
        })
}

/// Error resolving one record's type.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("failed to materialize {hash} at offset {offset}: {source}")]
pub struct ResolveError {
    pub offset: u64,
    pub hash: ObjectId,
    #[source]
    pub source: MaterializeError,
}

/// Sets `resolved_type` on every record.
pub fn resolve_types<H: HeaderSource>(
    records: &mut [ObjectRecord],
    objects: &mut PackObjects<'_, H>,
) -> Result<(), ResolveError> {
    for record in records.iter_mut() {
        let kind = objects
            .resolve_kind(record.offset)
            .map_err(|source| ResolveError {
                offset: record.offset,
                hash: record.hash,
                source,
            })?;
        tracing::trace!(offset = record.offset, %kind, "resolved");
        record.resolved_type = Some(kind);
    }
    Ok(())
}
