//! Fan-out table and bucket-restricted binary search
//!
//! `fanout[b]` counts the identifiers whose first byte is `<= b`, so the
//! identifiers starting with `b` occupy positions `fanout[b - 1]..fanout[b]`
//! (with `fanout[-1] = 0`). Searching only that bucket turns a search over
//! the whole table into one over roughly `N / 256` entries.

use crate::artifacts::pack::{FANOUT_ENTRIES, FANOUT_SIZE};
use crate::error::{PackError, PackResult};
use byteorder::{ByteOrder, NetworkEndian};
use std::cmp::Ordering;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fanout([u32; FANOUT_ENTRIES]);

impl Fanout {
    /// Parse 256 big-endian cumulative counts, rejecting decreasing tables
    pub fn parse(bytes: &[u8]) -> PackResult<Self> {
        if bytes.len() < FANOUT_SIZE {
            return Err(PackError::TruncatedIndex("fan-out table".to_string()));
        }

        let mut counts = [0u32; FANOUT_ENTRIES];
        NetworkEndian::read_u32_into(&bytes[..FANOUT_SIZE], &mut counts);

        if let Some(bucket) = counts.windows(2).position(|pair| pair[0] > pair[1]) {
            return Err(PackError::BadIndexFormat(format!(
                "fan-out decreases at bucket {}",
                bucket + 1
            )));
        }

        Ok(Fanout(counts))
    }

    /// Total number of entries in the index
    pub fn entry_count(&self) -> u32 {
        self.0[FANOUT_ENTRIES - 1]
    }

    /// Half-open range of positions whose identifier starts with `first_byte`
    pub fn bounds(&self, first_byte: u8) -> Range<u32> {
        let end = self.0[usize::from(first_byte)];
        let start = match first_byte {
            0 => 0,
            b => self.0[usize::from(b) - 1],
        };
        start..end
    }
}

/// Positional access to a sorted identifier table
pub trait OidTable {
    fn oid_at(&self, position: u32) -> &[u8];
}

/// Binary search `target` within `bounds`, comparing full identifiers
///
/// Only positions inside `bounds` are ever passed to `oid_at`. An empty
/// bucket returns `None` without touching the table.
pub fn search_bucket<T: OidTable + ?Sized>(
    table: &T,
    bounds: Range<u32>,
    target: &[u8],
) -> Option<u32> {
    let (mut lo, mut hi) = (bounds.start, bounds.end);

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match table.oid_at(mid).cmp(target) {
            Ordering::Less => lo = mid + 1,
            Ordering::Greater => hi = mid,
            Ordering::Equal => return Some(mid),
        }
    }

    None
}
