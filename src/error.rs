//! Error taxonomy for the packed object reader
//!
//! Every failure is reported to the caller; nothing is retried internally.
//! `NotFound` is an ordinary outcome that callers are expected to handle by
//! falling back to another pack or to loose storage.

use crate::artifacts::objects::object_id::ObjectId;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("bad pack index format: {0}")]
    BadIndexFormat(String),

    #[error("truncated pack index: {0}")]
    TruncatedIndex(String),

    #[error("pack index is not sorted at position {position}")]
    UnsortedIndex { position: u32 },

    #[error("{value} is out of range (limit {limit})")]
    OutOfRange { value: u64, limit: u64 },

    #[error("pack handle is closed")]
    Closed,

    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error("pack file is missing: {}", .0.display())]
    MissingPackFile(PathBuf),

    #[error("bad pack format: {0}")]
    BadPackFormat(String),

    #[error("corrupt record at offset {offset}: {reason}")]
    CorruptRecord { offset: u64, reason: String },

    #[error("record at offset {offset} declares {expected} bytes but inflates to {actual}")]
    SizeMismatch {
        offset: u64,
        expected: u64,
        actual: u64,
    },

    #[error("delta chain is deeper than {limit} links")]
    ChainTooDeep { limit: usize },

    #[error("delta expects a base of {expected} bytes, got {actual}")]
    DeltaBaseSizeMismatch { expected: u64, actual: u64 },

    #[error("delta declares {expected} result bytes, produced {actual}")]
    DeltaSizeMismatch { expected: u64, actual: u64 },

    #[error("corrupt delta: {0}")]
    CorruptDelta(&'static str),

    #[error("malformed identifier: {0}")]
    MalformedIdentifier(String),

    #[error("{what} checksum does not match")]
    ChecksumMismatch { what: &'static str },

    #[error("object {expected} hashes to {actual}")]
    IntegrityMismatch {
        expected: ObjectId,
        actual: ObjectId,
    },

    #[error("while resolving {at}: {source}")]
    Chain {
        at: ChainLink,
        #[source]
        source: Box<PackError>,
    },

    #[error("object locator failed: {0}")]
    Locator(#[source] anyhow::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The base reference that was being followed when a chain error happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainLink {
    Offset(u64),
    Id(ObjectId),
}

impl fmt::Display for ChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainLink::Offset(offset) => write!(f, "base at offset {offset}"),
            ChainLink::Id(oid) => write!(f, "base {oid}"),
        }
    }
}

impl PackError {
    /// Strip every layer of chain diagnostics and return the underlying fault.
    pub fn root(&self) -> &PackError {
        match self {
            PackError::Chain { source, .. } => source.root(),
            other => other,
        }
    }

    /// True when the object itself is absent (not one of its delta bases).
    pub fn is_absent(&self, oid: &ObjectId) -> bool {
        matches!(self, PackError::NotFound(missing) if missing == oid)
    }

    pub(crate) fn at(self, link: ChainLink) -> Self {
        PackError::Chain {
            at: link,
            source: Box::new(self),
        }
    }

    pub(crate) fn corrupt_record(offset: u64, reason: impl Into<String>) -> Self {
        PackError::CorruptRecord {
            offset,
            reason: reason.into(),
        }
    }
}

pub type PackResult<T> = Result<T, PackError>;
