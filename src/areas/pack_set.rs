//! Several packs of one repository read as a single store
//!
//! Hash-delta bases may live in any pack of the set or in loose storage. A
//! chain that crosses packs is still built in one loop, bounded by the set's
//! limits, so bases naming each other across packs end in `ChainTooDeep`.

use crate::areas::pack::Pack;
use crate::artifacts::database::object_locator::ObjectLocator;
use crate::artifacts::objects::object::RawObject;
use crate::artifacts::objects::object_id::{ObjectFormat, ObjectId};
use crate::artifacts::pack::delta_chain::BaseSource;
use crate::artifacts::pack::limits::DeltaLimits;
use crate::error::{PackError, PackResult};
use std::fmt;
use std::path::Path;
use tracing::{debug, trace};

pub struct PackSet {
    packs: Vec<Pack>,
    fallback: Option<Box<dyn ObjectLocator + Send + Sync>>,
    limits: DeltaLimits,
}

impl PackSet {
    pub fn new(packs: Vec<Pack>) -> Self {
        PackSet {
            packs,
            fallback: None,
            limits: DeltaLimits::default(),
        }
    }

    /// Open every index in `index_paths` (SHA-1)
    pub fn open<P: AsRef<Path>>(index_paths: impl IntoIterator<Item = P>) -> PackResult<Self> {
        Self::open_with_format(index_paths, ObjectFormat::Sha1)
    }

    pub fn open_with_format<P: AsRef<Path>>(
        index_paths: impl IntoIterator<Item = P>,
        format: ObjectFormat,
    ) -> PackResult<Self> {
        let packs = index_paths
            .into_iter()
            .map(|path| Pack::open_with_format(path, format))
            .collect::<PackResult<Vec<_>>>()?;
        debug!(packs = packs.len(), "opened pack set");

        Ok(Self::new(packs))
    }

    /// Consulted after every pack, typically loose object storage
    pub fn with_fallback(mut self, fallback: impl ObjectLocator + Send + Sync + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    /// Applies to the set and to every pack in it
    pub fn with_limits(mut self, limits: DeltaLimits) -> Self {
        self.limits = limits;
        self.packs = self
            .packs
            .into_iter()
            .map(|pack| pack.with_limits(limits))
            .collect();
        self
    }

    pub fn packs(&self) -> &[Pack] {
        &self.packs
    }

    pub fn close(&mut self) {
        self.packs.iter_mut().for_each(Pack::close);
    }

    /// Fully resolve `oid` from whichever pack holds it
    pub fn read_object(&self, oid: &ObjectId) -> PackResult<RawObject> {
        self.locate(oid)?.ok_or(PackError::NotFound(*oid))
    }

    /// True if some pack's index lists `oid`; the fallback is not consulted
    pub fn contains(&self, oid: &ObjectId) -> PackResult<bool> {
        for pack in &self.packs {
            if pack.index().contains(oid)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn fallback(&self) -> &dyn ObjectLocator {
        match &self.fallback {
            Some(fallback) => fallback.as_ref(),
            None => &(),
        }
    }
}

/// Objects in no pack go to the fallback; bases are searched across the set
impl ObjectLocator for PackSet {
    fn locate(&self, oid: &ObjectId) -> PackResult<Option<RawObject>> {
        let bases = BaseSource::new(&self.packs, self.fallback());

        for pack in &self.packs {
            match pack.index().find_offset(oid) {
                Ok(offset) => return pack.resolve_at(offset, bases, self.limits).map(Some),
                Err(PackError::NotFound(_)) => {
                    trace!(%oid, pack = %pack.index().path().display(), "not in pack");
                }
                Err(err) => return Err(err),
            }
        }

        self.fallback().locate(oid)
    }
}

impl fmt::Debug for PackSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackSet")
            .field("packs", &self.packs)
            .field("fallback", &self.fallback.is_some())
            .field("limits", &self.limits)
            .finish()
    }
}
