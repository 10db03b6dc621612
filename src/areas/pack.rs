//! A pack index together with its data file
//!
//! This is the entry point for reading objects: identifier in, fully
//! resolved typed content out.

use crate::areas::pack_file::PackFile;
use crate::areas::pack_index::PackIndex;
use crate::artifacts::database::object_locator::ObjectLocator;
use crate::artifacts::objects::object::{Object, RawObject};
use crate::artifacts::objects::object_id::{ObjectFormat, ObjectId};
use crate::artifacts::objects::pack_object::PackObject;
use crate::artifacts::pack::delta_chain::{BaseSource, DeltaChain};
use crate::artifacts::pack::limits::DeltaLimits;
use crate::error::PackResult;
use std::path::Path;

#[derive(Debug)]
pub struct Pack {
    index: PackIndex,
    file: PackFile,
    limits: DeltaLimits,
}

impl Pack {
    /// Open `pack-<hash>.idx` and its sibling `pack-<hash>.pack`
    pub fn open(index_path: impl AsRef<Path>) -> PackResult<Self> {
        Self::open_with_format(index_path, ObjectFormat::Sha1)
    }

    pub fn open_with_format(index_path: impl AsRef<Path>, format: ObjectFormat) -> PackResult<Self> {
        let index = PackIndex::open_with_format(index_path, format)?;
        let file = index.open_pack_file()?;

        Ok(Pack {
            index,
            file,
            limits: DeltaLimits::default(),
        })
    }

    pub fn with_limits(mut self, limits: DeltaLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> DeltaLimits {
        self.limits
    }

    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    pub fn file(&self) -> &PackFile {
        &self.file
    }

    /// Close both files; idempotent
    pub fn close(&mut self) {
        self.file.close();
        self.index.close();
    }

    /// Decode the record for `oid` without resolving deltas
    pub fn open_object(&self, oid: &ObjectId) -> PackResult<PackObject> {
        let offset = self.index.find_offset(oid)?;
        self.file.open_object(offset)
    }

    /// Fully resolve the object stored at `offset`
    ///
    /// `locator` answers hash-delta bases that are not in this pack.
    pub fn read_at(&self, offset: u64, locator: &dyn ObjectLocator) -> PackResult<RawObject> {
        self.resolve_at(offset, BaseSource::single(self, locator), self.limits)
    }

    /// Resolve the record at `offset`, taking hash bases from `bases`
    pub(crate) fn resolve_at<'a>(
        &'a self,
        offset: u64,
        bases: BaseSource<'a>,
        limits: DeltaLimits,
    ) -> PackResult<RawObject> {
        match self.file.open_object(offset)? {
            PackObject::Plain(object) => Ok(object),
            PackObject::Delta(delta) => DeltaChain::build(self, delta, bases, limits)?.resolve(),
        }
    }

    /// Fully resolve the object named `oid`
    pub fn read_object(&self, oid: &ObjectId, locator: &dyn ObjectLocator) -> PackResult<RawObject> {
        let offset = self.index.find_offset(oid)?;
        self.read_at(offset, locator)
    }

    /// Like `read_object`, then recompute the identifier from the content
    pub fn read_verified(
        &self,
        oid: &ObjectId,
        locator: &dyn ObjectLocator,
    ) -> PackResult<RawObject> {
        let object = self.read_object(oid, locator)?;
        object.verify(oid)?;
        Ok(object)
    }

    /// Compare every record's raw bytes against the index's CRC-32 table
    pub fn verify_crc32(&self) -> PackResult<()> {
        let entries = self.index.offsets_by_pack_order()?;
        let ends = entries
            .iter()
            .skip(1)
            .map(|(offset, _)| *offset)
            .chain(std::iter::once(self.file.data_end()));

        for (&(offset, position), end) in entries.iter().zip(ends) {
            self.file
                .check_record_crc(offset, end, self.index.read_crc32(position)?)?;
        }

        Ok(())
    }

    /// Check the index checksum, the pack checksum and every record CRC
    pub fn verify(&self) -> PackResult<()> {
        self.index.verify_checksum()?;
        self.file.verify_checksum()?;
        self.verify_crc32()
    }
}

/// Objects absent from this pack are `Ok(None)`; hash-delta bases are only
/// looked up inside the pack itself.
impl ObjectLocator for Pack {
    fn locate(&self, oid: &ObjectId) -> PackResult<Option<RawObject>> {
        match self.read_object(oid, &()) {
            Ok(object) => Ok(Some(object)),
            Err(err) if err.is_absent(oid) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
