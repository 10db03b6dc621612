use flate2::Compression;
use flate2::write::ZlibEncoder;
use packed_odb::artifacts::objects::checksum::Checksum;
use packed_odb::{ObjectFormat, ObjectId, ObjectType};
use std::io::Write;
use std::path::{Path, PathBuf};

const OFS_DELTA: u8 = 6;
const REF_DELTA: u8 = 7;

/// A record written by [`PackBuilder`]: its identifier, where it starts and
/// the type it resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub oid: ObjectId,
    pub offset: u64,
    pub object_type: ObjectType,
}

#[derive(Debug, Clone)]
struct IndexEntry {
    oid: ObjectId,
    offset: u64,
    crc: u32,
}

/// Writes small, exactly laid out packs and their v2 indexes
#[derive(Debug, Clone)]
pub struct PackBuilder {
    format: ObjectFormat,
    body: Vec<u8>,
    entries: Vec<IndexEntry>,
    large_offsets: bool,
}

impl Default for PackBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PackBuilder {
    pub fn new() -> Self {
        Self::with_format(ObjectFormat::Sha1)
    }

    pub fn with_format(format: ObjectFormat) -> Self {
        PackBuilder {
            format,
            body: Vec::new(),
            entries: Vec::new(),
            large_offsets: false,
        }
    }

    /// Store every offset through the 64-bit table
    pub fn force_large_offsets(mut self) -> Self {
        self.large_offsets = true;
        self
    }

    pub fn format(&self) -> ObjectFormat {
        self.format
    }

    /// Offset the next record will start at
    pub fn offset(&self) -> u64 {
        12 + self.body.len() as u64
    }

    /// Zero-fill up to `offset`; the filler belongs to no record
    pub fn pad_to(&mut self, offset: u64) -> &mut Self {
        assert!(offset >= self.offset(), "cannot pad backwards");
        let len = (offset - self.offset()) as usize;
        self.body.resize(self.body.len() + len, 0);
        self
    }

    pub fn add_plain(&mut self, object_type: ObjectType, content: &[u8]) -> Record {
        let mut record = encode_header(type_code(object_type), content.len() as u64);
        record.extend(deflate(content));

        let oid = ObjectId::hash_content(self.format, object_type, content);
        let offset = self.push_record(oid, &record);
        Record {
            oid,
            offset,
            object_type,
        }
    }

    /// Delta against an earlier record of this pack; `target` is the content
    /// the script produces
    pub fn add_offset_delta(&mut self, base: &Record, script: &[u8], target: &[u8]) -> Record {
        let offset = self.offset();
        let mut record = encode_header(OFS_DELTA, script.len() as u64);
        record.extend(encode_ofs(offset - base.offset));
        record.extend(deflate(script));

        let oid = ObjectId::hash_content(self.format, base.object_type, target);
        self.push_record(oid, &record);
        Record {
            oid,
            offset,
            object_type: base.object_type,
        }
    }

    /// Delta against `base` by identifier, wherever that object lives
    pub fn add_hash_delta(
        &mut self,
        base: ObjectId,
        object_type: ObjectType,
        script: &[u8],
        target: &[u8],
    ) -> Record {
        let mut record = encode_header(REF_DELTA, script.len() as u64);
        record.extend_from_slice(base.as_bytes());
        record.extend(deflate(script));

        let oid = ObjectId::hash_content(self.format, object_type, target);
        let offset = self.push_record(oid, &record);
        Record {
            oid,
            offset,
            object_type,
        }
    }

    /// Append arbitrary record bytes and list them under `oid`
    pub fn add_raw_record(&mut self, oid: ObjectId, bytes: &[u8]) -> u64 {
        self.push_record(oid, bytes)
    }

    fn push_record(&mut self, oid: ObjectId, bytes: &[u8]) -> u64 {
        let offset = self.offset();
        self.body.extend_from_slice(bytes);
        self.entries.push(IndexEntry {
            oid,
            offset,
            crc: crc32fast::hash(bytes),
        });
        offset
    }

    pub fn build(&self) -> BuiltPack {
        let mut pack = Vec::with_capacity(self.body.len() + 32);
        pack.extend_from_slice(b"PACK");
        pack.extend_from_slice(&2u32.to_be_bytes());
        pack.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        pack.extend_from_slice(&self.body);
        let pack_checksum = digest(self.format, &pack);
        pack.extend_from_slice(pack_checksum.as_bytes());

        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| a.oid.cmp(&b.oid));

        let mut index = Vec::new();
        index.extend_from_slice(b"\xfftOc");
        index.extend_from_slice(&2u32.to_be_bytes());
        for bucket in 0..=255u8 {
            let count = entries.iter().filter(|e| e.oid.first_byte() <= bucket).count();
            index.extend_from_slice(&(count as u32).to_be_bytes());
        }
        for entry in &entries {
            index.extend_from_slice(entry.oid.as_bytes());
        }
        for entry in &entries {
            index.extend_from_slice(&entry.crc.to_be_bytes());
        }

        let mut large = Vec::new();
        for entry in &entries {
            if self.large_offsets || entry.offset >= 0x8000_0000 {
                let slot = (large.len() / 8) as u32;
                index.extend_from_slice(&(0x8000_0000 | slot).to_be_bytes());
                large.extend_from_slice(&entry.offset.to_be_bytes());
            } else {
                index.extend_from_slice(&(entry.offset as u32).to_be_bytes());
            }
        }
        index.extend(large);
        index.extend_from_slice(pack_checksum.as_bytes());
        let index_checksum = digest(self.format, &index);
        index.extend_from_slice(index_checksum.as_bytes());

        BuiltPack { pack, index }
    }

    /// Build and write `<stem>.pack` and `<stem>.idx` under `dir`
    pub fn write(&self, dir: &Path, stem: &str) -> PathBuf {
        self.build().write(dir, stem)
    }
}

/// Raw bytes of a pack and its index, open to tampering before writing
#[derive(Debug, Clone)]
pub struct BuiltPack {
    pub pack: Vec<u8>,
    pub index: Vec<u8>,
}

impl BuiltPack {
    /// Returns the index path
    pub fn write(&self, dir: &Path, stem: &str) -> PathBuf {
        let index_path = dir.join(format!("{stem}.idx"));
        std::fs::write(&index_path, &self.index).expect("Failed to write index");
        std::fs::write(dir.join(format!("{stem}.pack")), &self.pack).expect("Failed to write pack");
        index_path
    }

    /// Byte position of identifier `position` inside the index
    pub fn oid_position(&self, format: ObjectFormat, position: usize) -> usize {
        8 + 1024 + position * format.oid_len()
    }
}

/// Builds delta scripts opcode by opcode
#[derive(Debug, Clone)]
pub struct DeltaScript {
    bytes: Vec<u8>,
}

impl DeltaScript {
    pub fn new(source_size: u64, target_size: u64) -> Self {
        let mut bytes = encode_varint(source_size);
        bytes.extend(encode_varint(target_size));
        DeltaScript { bytes }
    }

    pub fn copy(mut self, offset: u32, size: u32) -> Self {
        let mut opcode = 0x80u8;
        let mut args = Vec::new();
        for (i, byte) in offset.to_le_bytes().into_iter().enumerate() {
            if byte != 0 {
                opcode |= 1 << i;
                args.push(byte);
            }
        }
        // 0x10000 is the implied size when no size bytes follow
        if size != 0x10000 {
            for (i, byte) in size.to_le_bytes().into_iter().take(3).enumerate() {
                if byte != 0 {
                    opcode |= 0x10 << i;
                    args.push(byte);
                }
            }
        }
        self.bytes.push(opcode);
        self.bytes.extend(args);
        self
    }

    pub fn insert(mut self, data: &[u8]) -> Self {
        for chunk in data.chunks(127) {
            self.bytes.push(chunk.len() as u8);
            self.bytes.extend_from_slice(chunk);
        }
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

pub fn type_code(object_type: ObjectType) -> u8 {
    match object_type {
        ObjectType::Commit => 1,
        ObjectType::Tree => 2,
        ObjectType::Blob => 3,
        ObjectType::Tag => 4,
    }
}

pub fn encode_header(type_code: u8, mut size: u64) -> Vec<u8> {
    let mut byte = (type_code << 4) | (size & 0x0f) as u8;
    size >>= 4;
    let mut bytes = Vec::new();
    while size != 0 {
        bytes.push(byte | 0x80);
        byte = (size & 0x7f) as u8;
        size >>= 7;
    }
    bytes.push(byte);
    bytes
}

pub fn encode_ofs(mut distance: u64) -> Vec<u8> {
    let mut bytes = vec![(distance & 0x7f) as u8];
    distance >>= 7;
    while distance != 0 {
        distance -= 1;
        bytes.push(0x80 | (distance & 0x7f) as u8);
        distance >>= 7;
    }
    bytes.reverse();
    bytes
}

pub fn encode_varint(mut value: u64) -> Vec<u8> {
    let mut bytes = Vec::new();
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            bytes.push(byte);
            return bytes;
        }
        bytes.push(byte | 0x80);
    }
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("Failed to compress");
    encoder.finish().expect("Failed to compress")
}

fn digest(format: ObjectFormat, data: &[u8]) -> ObjectId {
    let mut checksum = Checksum::new(format);
    checksum.update(data);
    checksum.finalize()
}
