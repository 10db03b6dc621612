//! Object identifier (content hash)
//!
//! Identifiers are the raw digest bytes of an object's canonical form. Two
//! hash widths exist: 20 bytes (SHA-1) and 32 bytes (SHA-256). All width
//! dependent code asks [`ObjectFormat::oid_len`] instead of hard-coding 20.
//!
//! ## Format
//!
//! - Full: 40 (or 64) hex characters
//! - Short: First 7 characters
//!
//! ## Ordering
//!
//! Identifiers order byte-wise lexicographically. Pack indexes are sorted by
//! this ordering and lookups binary-search on it.

use crate::artifacts::objects::checksum::Checksum;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::{MAX_OID_LEN, SHORT_OID_LENGTH};
use crate::error::{PackError, PackResult};
use std::cmp::Ordering;
use std::fmt;
use std::io;

/// Hash function used by a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObjectFormat {
    #[default]
    Sha1,
    Sha256,
}

impl ObjectFormat {
    /// Width of a raw identifier in bytes
    pub const fn oid_len(self) -> usize {
        match self {
            ObjectFormat::Sha1 => 20,
            ObjectFormat::Sha256 => 32,
        }
    }

    /// Width of a hex-encoded identifier
    pub const fn hex_len(self) -> usize {
        self.oid_len() * 2
    }

    fn from_hex_len(len: usize) -> Option<Self> {
        match len {
            40 => Some(ObjectFormat::Sha1),
            64 => Some(ObjectFormat::Sha256),
            _ => None,
        }
    }
}

/// Object identifier
///
/// Stored inline so it is `Copy`; only the first `format.oid_len()` bytes
/// are meaningful, the rest stay zeroed.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    bytes: [u8; MAX_OID_LEN],
    format: ObjectFormat,
}

impl ObjectId {
    /// Parse and validate an object ID from its hex form
    ///
    /// The width (40 or 64 characters) selects the hash format. Upper and
    /// lower case digits are both accepted.
    pub fn try_parse(id: &str) -> PackResult<Self> {
        let format = ObjectFormat::from_hex_len(id.len()).ok_or_else(|| {
            PackError::MalformedIdentifier(format!("invalid object ID length: {}", id.len()))
        })?;
        if !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PackError::MalformedIdentifier(format!(
                "invalid object ID characters: {id}"
            )));
        }

        let mut bytes = [0u8; MAX_OID_LEN];
        for (i, byte) in bytes.iter_mut().take(format.oid_len()).enumerate() {
            *byte = u8::from_str_radix(&id[i * 2..i * 2 + 2], 16)
                .map_err(|_| PackError::MalformedIdentifier(id.to_string()))?;
        }

        Ok(Self { bytes, format })
    }

    /// Build an identifier from raw digest bytes
    pub fn from_bytes(format: ObjectFormat, raw: &[u8]) -> PackResult<Self> {
        if raw.len() != format.oid_len() {
            return Err(PackError::MalformedIdentifier(format!(
                "expected {} raw bytes, got {}",
                format.oid_len(),
                raw.len()
            )));
        }

        let mut bytes = [0u8; MAX_OID_LEN];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(Self { bytes, format })
    }

    /// Digest output is always exactly `oid_len` bytes wide
    pub(crate) fn from_digest(format: ObjectFormat, digest: &[u8]) -> Self {
        let mut bytes = [0u8; MAX_OID_LEN];
        bytes[..format.oid_len()].copy_from_slice(&digest[..format.oid_len()]);
        Self { bytes, format }
    }

    /// Read a raw identifier (20 or 32 bytes) from a stream
    pub fn read_from<R: io::Read + ?Sized>(reader: &mut R, format: ObjectFormat) -> io::Result<Self> {
        let mut bytes = [0u8; MAX_OID_LEN];
        reader.read_exact(&mut bytes[..format.oid_len()])?;
        Ok(Self { bytes, format })
    }

    /// The all-zero identifier of the given format
    pub fn zero(format: ObjectFormat) -> Self {
        Self {
            bytes: [0u8; MAX_OID_LEN],
            format,
        }
    }

    /// Hash an object's canonical form: `<type> <size>\0<content>`
    pub fn hash_content(format: ObjectFormat, object_type: ObjectType, content: &[u8]) -> Self {
        let mut checksum = Checksum::new(format);
        checksum.update(format!("{} {}\0", object_type.as_str(), content.len()).as_bytes());
        checksum.update(content);
        checksum.finalize()
    }

    pub fn format(&self) -> ObjectFormat {
        self.format
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.format.oid_len()]
    }

    /// Leading byte, used to pick the fan-out bucket
    pub fn first_byte(&self) -> u8 {
        self.bytes[0]
    }

    /// Get abbreviated form of the object ID
    pub fn to_short_oid(&self) -> String {
        let mut hex = self.to_string();
        hex.truncate(SHORT_OID_LENGTH);
        hex
    }
}

impl Ord for ObjectId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl PartialOrd for ObjectId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl AsRef<[u8]> for ObjectId {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl std::str::FromStr for ObjectId {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_parse(s)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.as_bytes() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_upper_and_lower_case() {
        let lower = ObjectId::try_parse("ffffffffffffffffffffffffffffffffffffffff").unwrap();
        let upper = ObjectId::try_parse("FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.as_bytes(), &[0xff; 20]);
    }

    #[test]
    fn rejects_bad_length_and_characters() {
        assert!(matches!(
            ObjectId::try_parse("abc"),
            Err(PackError::MalformedIdentifier(_))
        ));
        assert!(matches!(
            ObjectId::try_parse("zz00000000000000000000000000000000000000"),
            Err(PackError::MalformedIdentifier(_))
        ));
        assert!(ObjectId::from_bytes(ObjectFormat::Sha1, &[0u8; 19]).is_err());
    }

    #[test]
    fn sha256_width_is_inferred() {
        let oid = ObjectId::try_parse(&"ab".repeat(32)).unwrap();
        assert_eq!(oid.format(), ObjectFormat::Sha256);
        assert_eq!(oid.as_bytes().len(), 32);
    }

    #[test]
    fn hashes_the_empty_blob_like_git() {
        let oid = ObjectId::hash_content(ObjectFormat::Sha1, ObjectType::Blob, b"");
        assert_eq!(oid.to_string(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
        assert_eq!(oid.to_short_oid(), "e69de29");
    }

    #[test]
    fn hashes_content_with_sha256() {
        let oid = ObjectId::hash_content(ObjectFormat::Sha256, ObjectType::Blob, b"");
        assert_eq!(
            oid.to_string(),
            "473a0f4c3be8a93681a267e3b1e9a7dcda1185436fe141f7749120a303721813"
        );
    }

    proptest! {
        #[test]
        fn hex_form_survives_a_parse(raw in proptest::collection::vec(any::<u8>(), 20)) {
            let oid = ObjectId::from_bytes(ObjectFormat::Sha1, &raw).unwrap();
            prop_assert_eq!(ObjectId::try_parse(&oid.to_string()).unwrap(), oid);
        }

        #[test]
        fn ordering_matches_raw_bytes(
            a in proptest::collection::vec(any::<u8>(), 20),
            b in proptest::collection::vec(any::<u8>(), 20),
        ) {
            let left = ObjectId::from_bytes(ObjectFormat::Sha1, &a).unwrap();
            let right = ObjectId::from_bytes(ObjectFormat::Sha1, &b).unwrap();
            prop_assert_eq!(left.cmp(&right), a.cmp(&b));
        }
    }
}
