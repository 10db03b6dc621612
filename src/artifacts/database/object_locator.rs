use crate::artifacts::objects::object::RawObject;
use crate::artifacts::objects::object_id::ObjectId;
use crate::error::{PackError, PackResult};
use std::collections::HashMap;

/// Resolve an identifier to a fully materialized object
///
/// Used for hash-delta bases that are not in the pack being read. The
/// implementation may answer from any pack or from loose storage; absence
/// is `Ok(None)`, not an error.
pub trait ObjectLocator {
    fn locate(&self, oid: &ObjectId) -> PackResult<Option<RawObject>>;
}

impl<L: ObjectLocator + ?Sized> ObjectLocator for &L {
    fn locate(&self, oid: &ObjectId) -> PackResult<Option<RawObject>> {
        (**self).locate(oid)
    }
}

impl<L: ObjectLocator + ?Sized> ObjectLocator for Box<L> {
    fn locate(&self, oid: &ObjectId) -> PackResult<Option<RawObject>> {
        (**self).locate(oid)
    }
}

/// In-memory store, handy for thin packs whose bases were fetched separately
impl ObjectLocator for HashMap<ObjectId, RawObject> {
    fn locate(&self, oid: &ObjectId) -> PackResult<Option<RawObject>> {
        Ok(self.get(oid).cloned())
    }
}

/// Knows no objects at all
impl ObjectLocator for () {
    fn locate(&self, _oid: &ObjectId) -> PackResult<Option<RawObject>> {
        Ok(None)
    }
}

/// Adapts a closure backed by some other store (loose objects, a remote
/// cache) into a locator; its failures surface as `PackError::Locator`
pub struct FnLocator<F>(pub F);

impl<F> ObjectLocator for FnLocator<F>
where
    F: Fn(&ObjectId) -> anyhow::Result<Option<RawObject>>,
{
    fn locate(&self, oid: &ObjectId) -> PackResult<Option<RawObject>> {
        (self.0)(oid).map_err(PackError::Locator)
    }
}
