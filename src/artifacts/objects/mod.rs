//! Object types and identifiers
//!
//! Every object is addressed by the hash of its canonical form
//! `<type> <size>\0<content>`. There are four plain kinds:
//!
//! - **Blob**: File content (raw bytes)
//! - **Tree**: Directory listing
//! - **Commit**: Snapshot with metadata
//! - **Tag**: Annotated reference to another object
//!
//! Inside a pack, an object may also be stored as a delta against a base.

pub mod checksum;
pub mod object;
pub mod object_id;
pub mod object_type;
pub mod pack_object;

/// Widest supported raw identifier (SHA-256)
pub const MAX_OID_LEN: usize = 32;

/// Length of an abbreviated object ID
pub const SHORT_OID_LENGTH: usize = 7;
