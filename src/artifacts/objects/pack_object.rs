//! Decoded pack records
//!
//! A record is either a plain object (its payload is the final content) or a
//! delta (its payload is an edit script against a base object). Deltas name
//! their base either by absolute offset inside the same pack or by identifier.

use crate::artifacts::objects::object::{Object, RawObject};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::pack::delta;
use crate::error::PackResult;
use bytes::Bytes;

/// The six record kinds of the on-disk format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackObjectKind {
    Commit,
    Tree,
    Blob,
    Tag,
    OffsetDelta,
    HashDelta,
}

impl PackObjectKind {
    /// Decode the 3-bit type tag of a record header; 0 and 5 are reserved
    pub fn from_type_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(PackObjectKind::Commit),
            2 => Some(PackObjectKind::Tree),
            3 => Some(PackObjectKind::Blob),
            4 => Some(PackObjectKind::Tag),
            6 => Some(PackObjectKind::OffsetDelta),
            7 => Some(PackObjectKind::HashDelta),
            _ => None,
        }
    }

    pub fn type_code(self) -> u8 {
        match self {
            PackObjectKind::Commit => 1,
            PackObjectKind::Tree => 2,
            PackObjectKind::Blob => 3,
            PackObjectKind::Tag => 4,
            PackObjectKind::OffsetDelta => 6,
            PackObjectKind::HashDelta => 7,
        }
    }

    pub fn is_delta(self) -> bool {
        matches!(self, PackObjectKind::OffsetDelta | PackObjectKind::HashDelta)
    }

    /// The plain object type, or `None` for delta kinds
    pub fn object_type(self) -> Option<ObjectType> {
        match self {
            PackObjectKind::Commit => Some(ObjectType::Commit),
            PackObjectKind::Tree => Some(ObjectType::Tree),
            PackObjectKind::Blob => Some(ObjectType::Blob),
            PackObjectKind::Tag => Some(ObjectType::Tag),
            PackObjectKind::OffsetDelta | PackObjectKind::HashDelta => None,
        }
    }
}

impl From<ObjectType> for PackObjectKind {
    fn from(object_type: ObjectType) -> Self {
        match object_type {
            ObjectType::Commit => PackObjectKind::Commit,
            ObjectType::Tree => PackObjectKind::Tree,
            ObjectType::Blob => PackObjectKind::Blob,
            ObjectType::Tag => PackObjectKind::Tag,
        }
    }
}

/// Where a delta's base lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaBase {
    /// Absolute offset of the base record in the same pack
    Offset(u64),
    /// Identifier of the base, which may live in any pack or loose storage
    Hash(ObjectId),
}

/// Delta record with its inflated script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    offset: u64,
    base: DeltaBase,
    source_size: u64,
    target_size: u64,
    script: Bytes,
}

impl Delta {
    /// Wrap an inflated script, reading its source and target sizes up front
    pub fn parse(offset: u64, base: DeltaBase, script: Bytes) -> PackResult<Self> {
        let header = delta::ScriptHeader::parse(&script)?;

        Ok(Delta {
            offset,
            base,
            source_size: header.source_size,
            target_size: header.target_size,
            script,
        })
    }

    pub fn kind(&self) -> PackObjectKind {
        match self.base {
            DeltaBase::Offset(_) => PackObjectKind::OffsetDelta,
            DeltaBase::Hash(_) => PackObjectKind::HashDelta,
        }
    }

    /// Offset of this record in its pack
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn base(&self) -> &DeltaBase {
        &self.base
    }

    /// Size of the reconstructed object
    pub fn size(&self) -> u64 {
        self.target_size
    }

    /// Size the base must have for this script to apply
    pub fn source_size(&self) -> u64 {
        self.source_size
    }

    pub fn script(&self) -> &Bytes {
        &self.script
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackObject {
    Plain(RawObject),
    Delta(Delta),
}

impl PackObject {
    pub fn kind(&self) -> PackObjectKind {
        match self {
            PackObject::Plain(object) => object.object_type().into(),
            PackObject::Delta(delta) => delta.kind(),
        }
    }

    pub fn is_delta(&self) -> bool {
        matches!(self, PackObject::Delta(_))
    }

    /// Declared size; for deltas this is the reconstructed size
    pub fn size(&self) -> u64 {
        match self {
            PackObject::Plain(object) => object.size(),
            PackObject::Delta(delta) => delta.size(),
        }
    }
}
