//! Pack data file (`.pack`)
//!
//! ```text
//! "PACK" (4)  version (4)  object count (4)
//! records...
//! checksum (oid_len)
//! ```
//!
//! Every read is positional: callers name the absolute offset and no cursor
//! is shared between calls, so concurrent and nested reads (delta chains)
//! cannot disturb each other.

use crate::areas::pack_index::PackIndex;
use crate::artifacts::objects::checksum::Checksum;
use crate::artifacts::objects::object::RawObject;
use crate::artifacts::objects::object_id::{ObjectFormat, ObjectId};
use crate::artifacts::objects::pack_object::{Delta, DeltaBase, PackObject};
use crate::artifacts::pack::entry_header::{RecordKind, read_entry_header};
use crate::artifacts::pack::{PACK_HEADER_SIZE, PACK_SIGNATURE, PACK_VERSIONS};
use crate::error::{PackError, PackResult};
use byteorder::{ByteOrder, NetworkEndian};
use bytes::Bytes;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Inflated payloads larger than this grow their buffer on demand
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;
/// Read-ahead used while decoding a single record
const RECORD_BUFFER_SIZE: usize = 16 * 1024;

/// Open pack data file bound to the index it was opened from
#[derive(Debug)]
pub struct PackFile {
    path: PathBuf,
    /// `None` once closed
    handle: Option<PackHandle>,
    format: ObjectFormat,
    object_count: u32,
    /// Offset of the trailing checksum; records live in `12..data_end`
    data_end: u64,
    checksum: ObjectId,
}

impl PackFile {
    /// Open the sibling pack of `index` and check it belongs to that index
    ///
    /// The header must carry a known version and the same object count as
    /// the index, and the trailer must equal the index's pack checksum.
    pub fn open(index: &PackIndex) -> PackResult<Self> {
        let path = index.pack_path();
        let format = index.format()?;

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(PackError::MissingPackFile(path));
            }
            Err(err) => return Err(err.into()),
        };
        let handle = PackHandle::new(file);

        let len = handle.len()?;
        let data_end = len
            .checked_sub(format.oid_len() as u64)
            .filter(|end| *end >= PACK_HEADER_SIZE)
            .ok_or_else(|| PackError::BadPackFormat(format!("file too short ({len} bytes)")))?;

        let mut header = [0u8; PACK_HEADER_SIZE as usize];
        handle.read_exact_at(&mut header, 0)?;
        if &header[..4] != PACK_SIGNATURE {
            warn!(path = %path.display(), "rejected pack with invalid signature");
            return Err(PackError::BadPackFormat("invalid signature".to_string()));
        }
        let version = NetworkEndian::read_u32(&header[4..8]);
        if !PACK_VERSIONS.contains(&version) {
            return Err(PackError::BadPackFormat(format!(
                "unsupported version {version}"
            )));
        }
        let object_count = NetworkEndian::read_u32(&header[8..12]);
        if object_count != index.entry_count()? {
            return Err(PackError::BadPackFormat(format!(
                "pack holds {object_count} objects, index lists {}",
                index.entry_count()?
            )));
        }

        let mut trailer = vec![0u8; format.oid_len()];
        handle.read_exact_at(&mut trailer, data_end)?;
        let checksum = ObjectId::from_bytes(format, &trailer)?;
        if checksum != index.pack_checksum()? {
            warn!(path = %path.display(), "pack does not belong to its index");
            return Err(PackError::BadPackFormat(
                "trailer does not match the index's pack checksum".to_string(),
            ));
        }

        debug!(path = %path.display(), version, object_count, "opened pack file");

        Ok(PackFile {
            path,
            handle: Some(handle),
            format,
            object_count,
            data_end,
            checksum,
        })
    }

    /// Release the file handle; idempotent
    pub fn close(&mut self) {
        if self.handle.take().is_some() {
            debug!(path = %self.path.display(), "closed pack file");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    fn handle(&self) -> PackResult<&PackHandle> {
        self.handle.as_ref().ok_or(PackError::Closed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ObjectFormat {
        self.format
    }

    pub fn object_count(&self) -> u32 {
        self.object_count
    }

    pub fn checksum(&self) -> ObjectId {
        self.checksum
    }

    /// Offset where the trailing checksum starts
    pub fn data_end(&self) -> u64 {
        self.data_end
    }

    /// Decode the record at `offset`
    ///
    /// Plain records come back with their content; delta records come back
    /// with their base reference and inflated script, unresolved.
    pub fn open_object(&self, offset: u64) -> PackResult<PackObject> {
        let handle = self.handle()?;
        self.check_offset(offset)?;

        let mut reader = BufReader::with_capacity(
            RECORD_BUFFER_SIZE,
            PackCursor::new(handle, offset, self.data_end),
        );
        let header = read_entry_header(&mut reader, offset, self.format)?;
        let payload = Self::inflate(reader, offset, header.size)?;

        match header.kind {
            RecordKind::Plain(object_type) => {
                Ok(PackObject::Plain(RawObject::new(object_type, payload)))
            }
            RecordKind::Delta(base) => {
                if let DeltaBase::Offset(base_offset) = base {
                    // bases always precede their deltas
                    if base_offset >= offset {
                        return Err(PackError::OutOfRange {
                            value: base_offset,
                            limit: offset,
                        });
                    }
                    self.check_offset(base_offset)?;
                }
                Ok(PackObject::Delta(Delta::parse(offset, base, payload)?))
            }
        }
    }

    fn check_offset(&self, offset: u64) -> PackResult<()> {
        if offset < PACK_HEADER_SIZE || offset >= self.data_end {
            return Err(PackError::OutOfRange {
                value: offset,
                limit: self.data_end,
            });
        }
        Ok(())
    }

    /// Inflate exactly `size` bytes; producing more or fewer is `SizeMismatch`
    fn inflate<R: io::BufRead>(reader: R, offset: u64, size: u64) -> PackResult<Bytes> {
        let mut payload = Vec::with_capacity(size.min(MAX_PREALLOC) as usize);
        flate2::bufread::ZlibDecoder::new(reader)
            .take(size.saturating_add(1))
            .read_to_end(&mut payload)
            .map_err(|err| PackError::corrupt_record(offset, format!("inflate failed: {err}")))?;

        if payload.len() as u64 != size {
            return Err(PackError::SizeMismatch {
                offset,
                expected: size,
                actual: payload.len() as u64,
            });
        }

        Ok(Bytes::from(payload))
    }

    /// Raw (still compressed) bytes of `len` bytes starting at `offset`
    pub fn read_raw(&self, offset: u64, len: usize) -> PackResult<Bytes> {
        let handle = self.handle()?;
        let end = offset.saturating_add(len as u64);
        if offset < PACK_HEADER_SIZE || end > self.data_end {
            return Err(PackError::OutOfRange {
                value: end,
                limit: self.data_end,
            });
        }

        let mut buffer = vec![0u8; len];
        handle.read_exact_at(&mut buffer, offset)?;
        Ok(Bytes::from(buffer))
    }

    /// Check the raw bytes of entry `position` of `index` against its CRC-32
    ///
    /// A record spans from its offset to the next record's offset, or to the
    /// trailer for the last one.
    pub fn verify_crc32(&self, index: &PackIndex, position: u32) -> PackResult<()> {
        let offset = index.read_offset(position)?;
        let end = index.next_offset(offset)?.unwrap_or(self.data_end);

        self.check_record_crc(offset, end, index.read_crc32(position)?)
    }

    pub(crate) fn check_record_crc(&self, offset: u64, end: u64, expected: u32) -> PackResult<()> {
        let len = end
            .checked_sub(offset)
            .ok_or(PackError::OutOfRange { value: offset, limit: end })?;
        let raw = self.read_raw(offset, len as usize)?;

        if crc32fast::hash(&raw) != expected {
            warn!(path = %self.path.display(), offset, "record CRC-32 does not match the index");
            return Err(PackError::ChecksumMismatch {
                what: "record crc32",
            });
        }
        Ok(())
    }

    /// Stream everything before the trailer through the hash and compare
    pub fn verify_checksum(&self) -> PackResult<()> {
        let handle = self.handle()?;
        let mut checksum = Checksum::new(self.format);
        let mut reader = PackCursor::new(handle, 0, self.data_end);
        let mut buffer = vec![0u8; RECORD_BUFFER_SIZE * 4];

        loop {
            let read = reader.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            checksum.update(&buffer[..read]);
        }

        checksum.verify(&self.checksum, "pack")
    }
}

/// Positional access to the pack file
#[derive(Debug)]
struct PackHandle {
    #[cfg(unix)]
    file: File,
    /// Without `pread`, seek + read must not interleave between threads
    #[cfg(not(unix))]
    file: std::sync::Mutex<File>,
}

impl PackHandle {
    #[cfg(unix)]
    fn new(file: File) -> Self {
        PackHandle { file }
    }

    #[cfg(not(unix))]
    fn new(file: File) -> Self {
        PackHandle {
            file: std::sync::Mutex::new(file),
        }
    }

    #[cfg(unix)]
    fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    #[cfg(not(unix))]
    fn len(&self) -> io::Result<u64> {
        let file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("pack handle lock poisoned"))?;
        Ok(file.metadata()?.len())
    }

    #[cfg(unix)]
    fn read_at(&self, buffer: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(&self.file, buffer, offset)
    }

    #[cfg(not(unix))]
    fn read_at(&self, buffer: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::io::Seek;

        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("pack handle lock poisoned"))?;
        file.seek(io::SeekFrom::Start(offset))?;
        file.read(buffer)
    }

    fn read_exact_at(&self, mut buffer: &mut [u8], mut offset: u64) -> io::Result<()> {
        while !buffer.is_empty() {
            match self.read_at(buffer, offset) {
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(read) => {
                    buffer = &mut buffer[read..];
                    offset += read as u64;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

/// `Read` over `[position, end)` of the pack, one positional read per call
struct PackCursor<'h> {
    handle: &'h PackHandle,
    position: u64,
    end: u64,
}

impl<'h> PackCursor<'h> {
    fn new(handle: &'h PackHandle, position: u64, end: u64) -> Self {
        PackCursor {
            handle,
            position,
            end,
        }
    }
}

impl Read for PackCursor<'_> {
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        let remaining = self.end.saturating_sub(self.position);
        let want = buffer.len().min(remaining.min(usize::MAX as u64) as usize);
        if want == 0 {
            return Ok(0);
        }

        let read = self.handle.read_at(&mut buffer[..want], self.position)?;
        self.position += read as u64;
        Ok(read)
    }
}
