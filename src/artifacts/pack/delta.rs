//! Delta script interpreter
//!
//! A script starts with two little-endian base-128 varints (source size and
//! target size) followed by opcodes:
//!
//! - `1xxxxxxx` copy: the low 4 bits select which of up to 4 offset bytes
//!   follow, bits 4..6 select up to 3 size bytes (little-endian). A size of 0
//!   means 0x10000. Copies read from the source (pre-delta) buffer only.
//! - `0nnnnnnn` insert: `n` (1..=127) literal bytes follow.
//! - `00000000` is reserved and rejected.

use crate::error::{PackError, PackResult};
use bytes::Bytes;

/// Copy length used when a copy opcode encodes no size bytes
const DEFAULT_COPY_SIZE: usize = 0x10000;
/// Output preallocation cap; a corrupt header must not trigger a huge allocation
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// The two sizes at the head of every script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptHeader {
    pub source_size: u64,
    pub target_size: u64,
    /// Number of bytes the two varints occupy
    pub len: usize,
}

impl ScriptHeader {
    pub fn parse(script: &[u8]) -> PackResult<Self> {
        let mut pos = 0;
        let source_size = read_varint(script, &mut pos)?;
        let target_size = read_varint(script, &mut pos)?;

        Ok(ScriptHeader {
            source_size,
            target_size,
            len: pos,
        })
    }
}

fn read_varint(script: &[u8], pos: &mut usize) -> PackResult<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;

    loop {
        let byte = *script
            .get(*pos)
            .ok_or(PackError::CorruptDelta("truncated size header"))?;
        *pos += 1;

        if shift > 63 {
            return Err(PackError::CorruptDelta("size header overflows 64 bits"));
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

/// Take `count` bytes from the script, failing on truncation
fn take<'s>(script: &'s [u8], pos: &mut usize, count: usize) -> PackResult<&'s [u8]> {
    let end = pos
        .checked_add(count)
        .filter(|end| *end <= script.len())
        .ok_or(PackError::CorruptDelta("truncated opcode"))?;
    let bytes = &script[*pos..end];
    *pos = end;
    Ok(bytes)
}

/// Decode the optional little-endian fields of a copy opcode
fn copy_params(script: &[u8], pos: &mut usize, opcode: u8) -> PackResult<(usize, usize)> {
    let mut offset = 0usize;
    for i in 0..4 {
        if opcode & (1 << i) != 0 {
            offset |= usize::from(take(script, pos, 1)?[0]) << (8 * i);
        }
    }

    let mut size = 0usize;
    for i in 0..3 {
        if opcode & (0x10 << i) != 0 {
            size |= usize::from(take(script, pos, 1)?[0]) << (8 * i);
        }
    }
    if size == 0 {
        size = DEFAULT_COPY_SIZE;
    }

    Ok((offset, size))
}

/// Apply one script to `source`, producing the target buffer
pub fn apply_delta(source: &[u8], script: &[u8]) -> PackResult<Bytes> {
    let header = ScriptHeader::parse(script)?;
    if header.source_size != source.len() as u64 {
        return Err(PackError::DeltaBaseSizeMismatch {
            expected: header.source_size,
            actual: source.len() as u64,
        });
    }

    let target_size = header.target_size;
    let mut output = Vec::with_capacity(target_size.min(MAX_PREALLOC) as usize);
    let mut pos = header.len;

    while pos < script.len() {
        let opcode = script[pos];
        pos += 1;

        let chunk = if opcode & 0x80 != 0 {
            let (offset, size) = copy_params(script, &mut pos, opcode)?;
            offset
                .checked_add(size)
                .filter(|end| *end <= source.len())
                .map(|end| &source[offset..end])
                .ok_or(PackError::CorruptDelta("copy outside of the source buffer"))?
        } else if opcode != 0 {
            take(script, &mut pos, usize::from(opcode))?
        } else {
            return Err(PackError::CorruptDelta("reserved opcode 0"));
        };

        let produced = (output.len() + chunk.len()) as u64;
        if produced > target_size {
            return Err(PackError::DeltaSizeMismatch {
                expected: target_size,
                actual: produced,
            });
        }
        output.extend_from_slice(chunk);
    }

    if output.len() as u64 != target_size {
        return Err(PackError::DeltaSizeMismatch {
            expected: target_size,
            actual: output.len() as u64,
        });
    }

    Ok(Bytes::from(output))
}
