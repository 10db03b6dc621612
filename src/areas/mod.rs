//! Packed object storage
//!
//! - `pack_index`: `.idx` parsing, validation and identifier lookup
//! - `pack_file`: `.pack` header checks and positional record decoding
//! - `pack`: an index paired with its data file, resolving deltas
//! - `pack_set`: every pack of a repository behind one locator

pub mod pack;
pub mod pack_file;
pub mod pack_index;
pub mod pack_set;
