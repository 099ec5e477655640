//! Fixture builders shared by unit, integration and property tests: entry
//! headers, deltas, whole packs and their v2 indexes.
//!
//! Object IDs are synthetic. Verification never hashes object contents, so
//! any unique ID per object is a valid fixture.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::header::DiskType;
use super::index::{IDX_MAGIC, IDX_VERSION, LARGE_OFFSET_FLAG};
use super::object_id::{ObjectFormat, ObjectId};

/// SHA-1 object ID with every byte set to `b`.
pub fn oid(b: u8) -> ObjectId {
    ObjectId::from_slice(&[b; 20]).unwrap_or(ObjectId::null(ObjectFormat::Sha1))
}

/// Unique ID for object number `n`; the first byte spreads IDs across
/// fanout buckets.
pub fn numbered_oid(format: ObjectFormat, n: u32) -> ObjectId {
    let mut bytes = vec![0u8; format.hash_len()];
    bytes[0] = (n.wrapping_mul(37) & 0xff) as u8;
    bytes[1..5].copy_from_slice(&n.to_be_bytes());
    bytes[format.hash_len() - 1] = 0x5a;
    ObjectId::from_slice(&bytes).unwrap_or(ObjectId::null(format))
}

pub fn varint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            return out;
        }
    }
}

pub fn encode_entry_header(disk_type: DiskType, size: u64) -> Vec<u8> {
    let mut out = Vec::new();
    let mut remaining = size >> 4;
    let mut byte = (disk_type.tag() << 4) | (size & 0x0f) as u8;
    while remaining != 0 {
        out.push(byte | 0x80);
        byte = (remaining & 0x7f) as u8;
        remaining >>= 7;
    }
    out.push(byte);
    out
}

pub fn encode_ofs_distance(mut distance: u64) -> Vec<u8> {
    let mut out = vec![(distance & 0x7f) as u8];
    distance >>= 7;
    while distance != 0 {
        distance -= 1;
        out.push(0x80 | (distance & 0x7f) as u8);
        distance >>= 7;
    }
    out.reverse();
    out
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    // Writing into a Vec cannot fail.
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}

/// Delta that copies a whole `base_len`-byte base and appends `suffix`.
pub fn append_delta(base_len: usize, suffix: &[u8]) -> Vec<u8> {
    assert!(base_len > 0 && base_len < 0x1_0000 && suffix.len() < 0x80);
    let mut delta = varint(base_len as u64);
    delta.extend_from_slice(&varint((base_len + suffix.len()) as u64));
    delta.extend_from_slice(&[0xb0, (base_len & 0xff) as u8, (base_len >> 8) as u8]);
    if !suffix.is_empty() {
        delta.push(suffix.len() as u8);
        delta.extend_from_slice(suffix);
    }
    delta
}

/// Builds a v2 index for `(hash, offset)` pairs in any order.
pub fn build_idx(format: ObjectFormat, objects: &[(ObjectId, u64)]) -> Vec<u8> {
    let mut objects = objects.to_vec();
    objects.sort_by(|a, b| a.0.cmp(&b.0));

    let mut counts = [0u32; 256];
    for (id, _) in &objects {
        counts[id.as_slice()[0] as usize] += 1;
    }
    let mut out = Vec::new();
    out.extend_from_slice(&IDX_MAGIC);
    out.extend_from_slice(&IDX_VERSION.to_be_bytes());
    let mut running = 0u32;
    for count in counts {
        running += count;
        out.extend_from_slice(&running.to_be_bytes());
    }
    for (id, _) in &objects {
        out.extend_from_slice(id.as_slice());
    }
    out.extend(std::iter::repeat(0u8).take(objects.len() * 4));

    let mut large = Vec::new();
    for (_, offset) in &objects {
        if *offset >= u64::from(LARGE_OFFSET_FLAG) {
            let slot = (large.len() / 8) as u32;
            out.extend_from_slice(&(LARGE_OFFSET_FLAG | slot).to_be_bytes());
            large.extend_from_slice(&offset.to_be_bytes());
        } else {
            out.extend_from_slice(&(*offset as u32).to_be_bytes());
        }
    }
    out.extend_from_slice(&large);
    out.extend(std::iter::repeat(0u8).take(2 * format.hash_len()));
    out
}

/// Incremental pack writer; hashes are supplied by the test.
#[derive(Debug)]
pub struct PackBuilder {
    format: ObjectFormat,
    bytes: Vec<u8>,
    objects: Vec<(ObjectId, u64)>,
}

impl PackBuilder {
    pub fn new(format: ObjectFormat) -> Self {
        let mut bytes = b"PACK".to_vec();
        bytes.extend_from_slice(&2u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        Self {
            format,
            bytes,
            objects: Vec::new(),
        }
    }

    /// Appends an entry whose payload is already compressed.
    pub fn raw_entry(&mut self, id: ObjectId, header: &[u8], compressed: &[u8]) -> u64 {
        let offset = self.bytes.len() as u64;
        self.bytes.extend_from_slice(header);
        self.bytes.extend_from_slice(compressed);
        self.objects.push((id, offset));
        offset
    }

    pub fn literal(&mut self, id: ObjectId, kind: impl Into<DiskType>, data: &[u8]) -> u64 {
        let header = encode_entry_header(kind.into(), data.len() as u64);
        self.raw_entry(id, &header, &zlib(data))
    }

    pub fn ofs_delta(&mut self, id: ObjectId, base_offset: u64, delta: &[u8]) -> u64 {
        let distance = self.next_offset() - base_offset;
        self.ofs_delta_raw(id, distance, delta)
    }

    /// OFS_DELTA with an arbitrary encoded distance, for corrupt fixtures.
    pub fn ofs_delta_raw(&mut self, id: ObjectId, distance: u64, delta: &[u8]) -> u64 {
        let mut header = encode_entry_header(DiskType::OfsDelta, delta.len() as u64);
        header.extend_from_slice(&encode_ofs_distance(distance));
        self.raw_entry(id, &header, &zlib(delta))
    }

    pub fn ref_delta(&mut self, id: ObjectId, base: ObjectId, delta: &[u8]) -> u64 {
        let mut header = encode_entry_header(DiskType::RefDelta, delta.len() as u64);
        header.extend_from_slice(base.as_slice());
        self.raw_entry(id, &header, &zlib(delta))
    }

    /// Offset the next entry will get.
    pub fn next_offset(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Returns `(pack, idx)` bytes. The trailer is zero-filled.
    pub fn finish(mut self) -> (Vec<u8>, Vec<u8>) {
        let count = self.objects.len() as u32;
        self.bytes[8..12].copy_from_slice(&count.to_be_bytes());
        self.bytes
            .extend(std::iter::repeat(0u8).take(self.format.hash_len()));
        let idx = build_idx(self.format, &self.objects);
        (self.bytes, idx)
    }

    /// Writes `<stem>.pack` and `<stem>.idx` into `dir`; returns the idx path.
    pub fn write_to(self, dir: &Path, stem: &str) -> io::Result<PathBuf> {
        let (pack, idx) = self.finish();
        let idx_path = dir.join(format!("{stem}.idx"));
        fs::write(dir.join(format!("{stem}.pack")), pack)?;
        fs::write(&idx_path, idx)?;
        Ok(idx_path)
    }
}
