//! Pack index (`.idx`, version 2)
//!
//! The index maps identifiers to byte offsets in the sibling `.pack` file.
//!
//! ## Index File Format
//!
//! ```text
//! magic (4)  version (4)
//! fan-out         256 * u32 BE cumulative counts
//! identifiers     N * oid_len, strictly ascending
//! crc32           N * u32 BE, CRC of each raw record
//! offsets         N * u32 BE, high bit set => index into large offsets
//! large offsets   M * u64 BE
//! pack checksum   oid_len
//! index checksum  oid_len
//! ```
//!
//! The whole file is validated when opened: magic, version, table sizes,
//! fan-out monotonicity, strict ordering of identifiers and the targets of
//! large-offset redirections. A single bad entry rejects the whole index.

use crate::areas::pack_file::PackFile;
use crate::artifacts::objects::checksum::Checksum;
use crate::artifacts::objects::object_id::{ObjectFormat, ObjectId};
use crate::artifacts::pack::fanout::{Fanout, OidTable, search_bucket};
use crate::artifacts::pack::{
    FANOUT_SIZE, IDX_HEADER_SIZE, IDX_SIGNATURE, IDX_VERSION, LARGE_OFFSET_FLAG,
};
use crate::error::{PackError, PackResult};
use byteorder::{ByteOrder, NetworkEndian};
use bytes::Bytes;
use std::io::Read;
use std::ops::{DerefMut, Range};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Read-only pack index
///
/// Safe to query from many threads at once; nothing is mutated after
/// `open` returns. Closing drops the tables and every later query fails
/// with `Closed`.
#[derive(Debug)]
pub struct PackIndex {
    /// Path to the index file (`pack-<hash>.idx`)
    path: Box<Path>,
    /// Parsed tables; `None` once closed
    tables: Option<IndexTables>,
}

/// Zero-copy views into the raw index bytes
#[derive(Debug)]
struct IndexTables {
    format: ObjectFormat,
    raw: Bytes,
    fanout: Fanout,
    oids: Bytes,
    crcs: Bytes,
    offsets: Bytes,
    large_offsets: Bytes,
    /// Every record offset, ascending
    pack_order: Vec<u64>,
    pack_checksum: ObjectId,
    index_checksum: ObjectId,
}

impl PackIndex {
    /// Open a SHA-1 pack index
    pub fn open(path: impl AsRef<Path>) -> PackResult<Self> {
        Self::open_with_format(path, ObjectFormat::Sha1)
    }

    /// Open a pack index whose identifiers use `format`
    ///
    /// The file is read in full under a shared lock; the handle is released
    /// before this returns, on success and on every error path.
    pub fn open_with_format(path: impl AsRef<Path>, format: ObjectFormat) -> PackResult<Self> {
        let path = path.as_ref();
        let raw = Self::read_locked(path)?;
        let tables = IndexTables::parse(raw, format).inspect_err(|err| {
            warn!(path = %path.display(), %err, "rejected pack index");
        })?;

        debug!(
            path = %path.display(),
            entries = tables.entry_count(),
            large_offsets = tables.large_offsets.len() / 8,
            "opened pack index"
        );

        Ok(PackIndex {
            path: path.into(),
            tables: Some(tables),
        })
    }

    fn read_locked(path: &Path) -> PackResult<Bytes> {
        let mut index_file = std::fs::OpenOptions::new().read(true).open(path)?;
        let mut lock = file_guard::lock(&mut index_file, file_guard::Lock::Shared, 0, 1)?;

        let mut raw = Vec::new();
        lock.deref_mut().read_to_end(&mut raw)?;

        Ok(Bytes::from(raw))
    }

    /// Release the tables; idempotent
    pub fn close(&mut self) {
        if self.tables.take().is_some() {
            debug!(path = %self.path.display(), "closed pack index");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tables.is_none()
    }

    fn tables(&self) -> PackResult<&IndexTables> {
        self.tables.as_ref().ok_or(PackError::Closed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling data file: same name with a `.pack` extension
    pub fn pack_path(&self) -> PathBuf {
        self.path.with_extension("pack")
    }

    /// Open the data file that belongs to this index
    pub fn open_pack_file(&self) -> PackResult<PackFile> {
        PackFile::open(self)
    }

    pub fn format(&self) -> PackResult<ObjectFormat> {
        Ok(self.tables()?.format)
    }

    pub fn entry_count(&self) -> PackResult<u32> {
        Ok(self.tables()?.entry_count())
    }

    /// Trailing checksum of the paired pack file
    pub fn pack_checksum(&self) -> PackResult<ObjectId> {
        Ok(self.tables()?.pack_checksum)
    }

    /// Trailing checksum of this index file
    pub fn index_checksum(&self) -> PackResult<ObjectId> {
        Ok(self.tables()?.index_checksum)
    }

    /// Positions of the entries whose identifier starts with `first_byte`
    pub fn bounds(&self, first_byte: u8) -> PackResult<Range<u32>> {
        Ok(self.tables()?.fanout.bounds(first_byte))
    }

    pub fn read_identifier(&self, position: u32) -> PackResult<ObjectId> {
        let tables = self.tables()?;
        tables.check_position(position)?;
        ObjectId::from_bytes(tables.format, tables.oid_at(position))
    }

    pub fn read_offset(&self, position: u32) -> PackResult<u64> {
        let tables = self.tables()?;
        tables.check_position(position)?;
        tables.offset_at(position)
    }

    pub fn read_crc32(&self, position: u32) -> PackResult<u32> {
        let tables = self.tables()?;
        tables.check_position(position)?;
        let at = position as usize * 4;
        Ok(NetworkEndian::read_u32(&tables.crcs[at..at + 4]))
    }

    /// Resolve an identifier to the offset of its record in the pack
    ///
    /// Binary search runs only inside the identifier's fan-out bucket.
    pub fn find_offset(&self, oid: &ObjectId) -> PackResult<u64> {
        let tables = self.tables()?;
        if oid.format() != tables.format {
            return Err(PackError::MalformedIdentifier(format!(
                "{oid} does not match the index hash format"
            )));
        }

        let bounds = tables.fanout.bounds(oid.first_byte());
        match search_bucket(tables, bounds, oid.as_bytes()) {
            Some(position) => tables.offset_at(position),
            None => Err(PackError::NotFound(*oid)),
        }
    }

    pub fn contains(&self, oid: &ObjectId) -> PackResult<bool> {
        match self.find_offset(oid) {
            Ok(_) => Ok(true),
            Err(PackError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// All offsets ordered by position in the pack, paired with their index position
    pub fn offsets_by_pack_order(&self) -> PackResult<Vec<(u64, u32)>> {
        let tables = self.tables()?;
        let mut entries = (0..tables.entry_count())
            .map(|position| Ok((tables.offset_at(position)?, position)))
            .collect::<PackResult<Vec<_>>>()?;
        entries.sort_unstable();
        Ok(entries)
    }

    /// Smallest record offset greater than `offset`, if any
    pub fn next_offset(&self, offset: u64) -> PackResult<Option<u64>> {
        let order = &self.tables()?.pack_order;
        let at = order.partition_point(|&other| other <= offset);
        Ok(order.get(at).copied())
    }

    /// Recompute the index checksum over everything before it
    pub fn verify_checksum(&self) -> PackResult<()> {
        let tables = self.tables()?;
        let body_len = tables.raw.len() - tables.format.oid_len();

        let mut checksum = Checksum::new(tables.format);
        checksum.update(&tables.raw[..body_len]);
        checksum.verify(&tables.index_checksum, "pack index")
    }
}

impl IndexTables {
    fn parse(raw: Bytes, format: ObjectFormat) -> PackResult<Self> {
        let oid_len = format.oid_len();

        if raw.len() < IDX_HEADER_SIZE {
            return Err(PackError::TruncatedIndex("missing header".to_string()));
        }
        if raw[..4] != IDX_SIGNATURE {
            return Err(PackError::BadIndexFormat("invalid signature".to_string()));
        }
        let version = NetworkEndian::read_u32(&raw[4..8]);
        if version != IDX_VERSION {
            return Err(PackError::BadIndexFormat(format!(
                "unsupported version {version}"
            )));
        }

        let fanout = Fanout::parse(&raw[IDX_HEADER_SIZE..])?;
        let count = fanout.entry_count() as usize;

        let oids_start = IDX_HEADER_SIZE + FANOUT_SIZE;
        let crcs_start = oids_start + count * oid_len;
        let offsets_start = crcs_start + count * 4;
        let large_start = offsets_start + count * 4;
        let trailer_len = 2 * oid_len;

        if raw.len() < large_start + trailer_len {
            return Err(PackError::TruncatedIndex(format!(
                "{count} entries need at least {} bytes, file has {}",
                large_start + trailer_len,
                raw.len()
            )));
        }

        let large_end = raw.len() - trailer_len;
        if (large_end - large_start) % 8 != 0 {
            return Err(PackError::BadIndexFormat(
                "large offset table is not a multiple of 8 bytes".to_string(),
            ));
        }

        let pack_checksum = ObjectId::from_bytes(format, &raw[large_end..large_end + oid_len])?;
        let index_checksum = ObjectId::from_bytes(format, &raw[large_end + oid_len..])?;

        let mut tables = IndexTables {
            format,
            fanout,
            oids: raw.slice(oids_start..crcs_start),
            crcs: raw.slice(crcs_start..offsets_start),
            offsets: raw.slice(offsets_start..large_start),
            large_offsets: raw.slice(large_start..large_end),
            pack_order: Vec::new(),
            pack_checksum,
            index_checksum,
            raw,
        };
        tables.pack_order = tables.validate_entries()?;

        Ok(tables)
    }

    /// Check ordering, bucket membership and large-offset targets of every
    /// entry, returning the offsets in pack order
    fn validate_entries(&self) -> PackResult<Vec<u64>> {
        let mut offsets = Vec::with_capacity(self.entry_count() as usize);
        let mut bucket = 0u8;
        for position in 0..self.entry_count() {
            let oid = self.oid_at(position);

            if position > 0 && self.oid_at(position - 1) >= oid {
                return Err(PackError::UnsortedIndex { position });
            }

            while !self.fanout.bounds(bucket).contains(&position) {
                bucket = bucket.checked_add(1).ok_or_else(|| {
                    PackError::BadIndexFormat(format!("position {position} is in no bucket"))
                })?;
            }
            if oid[0] != bucket {
                return Err(PackError::BadIndexFormat(format!(
                    "entry {position} sits in fan-out bucket {bucket:#04x}"
                )));
            }

            offsets.push(self.offset_at(position)?);
        }

        offsets.sort_unstable();
        Ok(offsets)
    }

    fn entry_count(&self) -> u32 {
        self.fanout.entry_count()
    }

    fn check_position(&self, position: u32) -> PackResult<()> {
        if position >= self.entry_count() {
            return Err(PackError::OutOfRange {
                value: u64::from(position),
                limit: u64::from(self.entry_count()),
            });
        }
        Ok(())
    }

    fn offset_at(&self, position: u32) -> PackResult<u64> {
        let at = position as usize * 4;
        let raw = NetworkEndian::read_u32(&self.offsets[at..at + 4]);
        if raw & LARGE_OFFSET_FLAG == 0 {
            return Ok(u64::from(raw));
        }

        let at = (raw & !LARGE_OFFSET_FLAG) as usize * 8;
        self.large_offsets
            .get(at..at + 8)
            .map(NetworkEndian::read_u64)
            .ok_or_else(|| {
                PackError::TruncatedIndex(format!(
                    "entry {position} points past the large offset table"
                ))
            })
    }
}

impl OidTable for IndexTables {
    fn oid_at(&self, position: u32) -> &[u8] {
        let oid_len = self.format.oid_len();
        let at = position as usize * oid_len;
        &self.oids[at..at + oid_len]
    }
}
