//! Pack record header codec
//!
//! ```text
//! first byte:  C TTT SSSS     C = continuation, T = type tag, S = size bits 0..4
//! next bytes:  C SSSSSSS      7 more size bits each, least significant first
//! ```
//!
//! Offset deltas follow with a big-endian base-128 backward distance in
//! which every continuation adds one before shifting, so each magnitude has
//! exactly one encoding. Hash deltas follow with the raw base identifier.

use crate::artifacts::objects::object_id::{ObjectFormat, ObjectId};
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::pack_object::{DeltaBase, PackObjectKind};
use crate::error::{PackError, PackResult};
use byteorder::ReadBytesExt;
use std::io::{self, Read};

/// Longest size varint that still fits in 64 bits (4 + 9 * 7 bits)
const MAX_SIZE_BYTES: usize = 10;
/// Longest backward offset encoding that still fits in 64 bits
const MAX_OFS_BYTES: usize = 10;

/// What a record header says about the payload that follows it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Plain(ObjectType),
    Delta(DeltaBase),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub kind: RecordKind,
    /// Inflated payload length: content for plain records, script for deltas
    pub size: u64,
}

/// Running-out-of-bytes inside a header means the record is corrupt
fn truncated(offset: u64) -> impl Fn(io::Error) -> PackError {
    move |err| match err.kind() {
        io::ErrorKind::UnexpectedEof => PackError::corrupt_record(offset, "truncated header"),
        _ => PackError::Io(err),
    }
}

/// Decode the header of the record starting at `offset`
///
/// `reader` must be positioned at `offset`. On return it is positioned at
/// the first byte of the compressed payload.
pub fn read_entry_header<R: Read>(
    reader: &mut R,
    offset: u64,
    format: ObjectFormat,
) -> PackResult<EntryHeader> {
    let mut byte = reader.read_u8().map_err(truncated(offset))?;
    let mut size_bytes = 1;

    let type_code = (byte >> 4) & 0x07;
    let mut size = u64::from(byte & 0x0f);
    let mut shift = 4u32;

    while byte & 0x80 != 0 {
        if size_bytes >= MAX_SIZE_BYTES {
            return Err(PackError::corrupt_record(offset, "size field too long"));
        }
        byte = reader.read_u8().map_err(truncated(offset))?;
        size_bytes += 1;
        size |= u64::from(byte & 0x7f) << shift;
        shift += 7;
    }

    let kind = PackObjectKind::from_type_code(type_code)
        .ok_or_else(|| PackError::corrupt_record(offset, format!("invalid type tag {type_code}")))?;

    let kind = match kind {
        PackObjectKind::OffsetDelta => {
            let distance = read_backward_offset(reader, offset)?;
            let base = offset.checked_sub(distance).ok_or(PackError::OutOfRange {
                value: distance,
                limit: offset,
            })?;
            RecordKind::Delta(DeltaBase::Offset(base))
        }
        PackObjectKind::HashDelta => {
            let oid = ObjectId::read_from(reader, format).map_err(truncated(offset))?;
            RecordKind::Delta(DeltaBase::Hash(oid))
        }
        plain => match plain.object_type() {
            Some(object_type) => RecordKind::Plain(object_type),
            None => return Err(PackError::corrupt_record(offset, "unexpected delta kind")),
        },
    };

    Ok(EntryHeader { kind, size })
}

fn read_backward_offset<R: Read>(reader: &mut R, offset: u64) -> PackResult<u64> {
    let mut byte = reader.read_u8().map_err(truncated(offset))?;
    let mut distance = u64::from(byte & 0x7f);
    let mut len = 1;

    while byte & 0x80 != 0 {
        if len >= MAX_OFS_BYTES {
            return Err(PackError::corrupt_record(offset, "base offset too long"));
        }
        byte = reader.read_u8().map_err(truncated(offset))?;
        len += 1;
        distance = distance
            .checked_add(1)
            .and_then(|d| d.checked_mul(128))
            .ok_or_else(|| PackError::corrupt_record(offset, "base offset overflows"))?
            | u64::from(byte & 0x7f);
    }

    Ok(distance)
}
