use crate::artifacts::objects::object_id::{ObjectFormat, ObjectId};
use crate::error::{PackError, PackResult};
use sha1::{Digest, Sha1};
use sha2::Sha256;

/// Running digest in the repository's hash format
///
/// Used for object identifiers and for the trailing checksums of index and
/// pack files.
#[derive(Debug, Clone)]
pub struct Checksum {
    digest: Hasher,
}

#[derive(Debug, Clone)]
enum Hasher {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl Checksum {
    pub fn new(format: ObjectFormat) -> Self {
        let digest = match format {
            ObjectFormat::Sha1 => Hasher::Sha1(Sha1::new()),
            ObjectFormat::Sha256 => Hasher::Sha256(Sha256::new()),
        };
        Checksum { digest }
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.digest {
            Hasher::Sha1(digest) => digest.update(data),
            Hasher::Sha256(digest) => digest.update(data),
        }
    }

    pub fn finalize(self) -> ObjectId {
        match self.digest {
            Hasher::Sha1(digest) => ObjectId::from_digest(ObjectFormat::Sha1, &digest.finalize()),
            Hasher::Sha256(digest) => {
                ObjectId::from_digest(ObjectFormat::Sha256, &digest.finalize())
            }
        }
    }

    /// Compare the digest with the value stored on disk
    pub fn verify(self, expected: &ObjectId, what: &'static str) -> PackResult<()> {
        if self.finalize() != *expected {
            tracing::warn!(what, "checksum does not match value stored on disk");
            return Err(PackError::ChecksumMismatch { what });
        }

        Ok(())
    }
}
