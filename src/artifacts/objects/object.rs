use crate::artifacts::objects::object_id::{ObjectFormat, ObjectId};
use crate::artifacts::objects::object_type::ObjectType;
use crate::error::{PackError, PackResult};
use bytes::Bytes;
use derive_new::new;

pub trait Packable {
    /// Canonical serialized form: `<type> <size>\0<content>`
    fn serialize(&self) -> Bytes;
}

pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    fn content(&self) -> &Bytes;

    fn object_id(&self, format: ObjectFormat) -> ObjectId {
        ObjectId::hash_content(format, self.object_type(), self.content())
    }

    /// Recompute the identifier and compare it with the one used to find
    /// the object. A mismatch is a data-integrity fault, not a format error.
    fn verify(&self, expected: &ObjectId) -> PackResult<()> {
        let actual = self.object_id(expected.format());
        if actual != *expected {
            tracing::warn!(%expected, %actual, "object content does not match its identifier");
            return Err(PackError::IntegrityMismatch {
                expected: *expected,
                actual,
            });
        }

        Ok(())
    }
}

/// Fully materialized object: final type plus final content bytes
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct RawObject {
    object_type: ObjectType,
    content: Bytes,
}

impl RawObject {
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn into_content(self) -> Bytes {
        self.content
    }
}

impl Packable for RawObject {
    fn serialize(&self) -> Bytes {
        let header = format!("{} {}\0", self.object_type, self.content.len());
        let mut bytes = Vec::with_capacity(header.len() + self.content.len());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(&self.content);
        Bytes::from(bytes)
    }
}

impl Object for RawObject {
    fn object_type(&self) -> ObjectType {
        self.object_type
    }

    fn content(&self) -> &Bytes {
        &self.content
    }
}
