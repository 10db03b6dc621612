//! Pack format building blocks
//!
//! - `fanout`: fan-out table and bucket-restricted binary search
//! - `entry_header`: record header codec (type, size, delta base)
//! - `delta`: delta script interpreter
//! - `delta_chain`: chain building and forward replay
//! - `limits`: resolution bounds

pub mod delta;
pub mod delta_chain;
pub mod entry_header;
pub mod fanout;
pub mod limits;

/// Pack index magic bytes (`\377tOc`)
pub const IDX_SIGNATURE: [u8; 4] = [0xff, b't', b'O', b'c'];
/// Only supported pack index version
pub const IDX_VERSION: u32 = 2;
/// Magic plus version
pub const IDX_HEADER_SIZE: usize = 8;
/// Number of fan-out buckets
pub const FANOUT_ENTRIES: usize = 256;
/// Fan-out table size in bytes
pub const FANOUT_SIZE: usize = FANOUT_ENTRIES * 4;
/// High bit of an offset entry redirects into the large-offset table
pub const LARGE_OFFSET_FLAG: u32 = 0x8000_0000;

/// Pack data magic bytes
pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
/// Accepted pack data versions
pub const PACK_VERSIONS: [u32; 2] = [2, 3];
/// Magic, version and object count
pub const PACK_HEADER_SIZE: u64 = 12;
