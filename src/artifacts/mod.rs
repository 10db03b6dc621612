//! Formats and algorithms behind packed storage
//!
//! - `database`: the object locator seam
//! - `objects`: identifiers, object types and decoded pack objects
//! - `pack`: on-disk layouts, record headers, delta scripts and chains

pub mod database;
pub mod objects;
pub mod pack;
