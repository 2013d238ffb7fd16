use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// General purpose flag bit 3: crc and sizes follow the payload.
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

/// Local File Header (LFH) - 30 bytes
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    pub const SIGNATURE: &'static [u8] = b"PK\x03\x04";
    pub const SIZE: usize = 30;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            bail!("Truncated Local File Header");
        }

        if &data[0..4] != Self::SIGNATURE {
            bail!("Invalid Local File Header");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            version_needed: cursor.read_u16::<LittleEndian>()?,
            flags: cursor.read_u16::<LittleEndian>()?,
            compression_method: cursor.read_u16::<LittleEndian>()?,
            last_mod_time: cursor.read_u16::<LittleEndian>()?,
            last_mod_date: cursor.read_u16::<LittleEndian>()?,
            crc32: cursor.read_u32::<LittleEndian>()?,
            compressed_size: cursor.read_u32::<LittleEndian>()?,
            uncompressed_size: cursor.read_u32::<LittleEndian>()?,
            file_name_length: cursor.read_u16::<LittleEndian>()?,
            extra_field_length: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }
}

/// Data descriptor trailing a payload written with [`FLAG_DATA_DESCRIPTOR`].
///
/// The signature is optional on disk; `SIZE` excludes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

impl DataDescriptor {
    pub const SIGNATURE: &'static [u8] = b"PK\x07\x08";
    pub const SIZE: usize = 12;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            bail!("Truncated data descriptor");
        }

        let mut cursor = Cursor::new(data);

        Ok(Self {
            crc32: cursor.read_u32::<LittleEndian>()?,
            compressed_size: cursor.read_u32::<LittleEndian>()?,
            uncompressed_size: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// GZIP header flag bits
pub mod gzip_flags {
    pub const FTEXT: u8 = 0x01;
    pub const FHCRC: u8 = 0x02;
    pub const FEXTRA: u8 = 0x04;
    pub const FNAME: u8 = 0x08;
    pub const FCOMMENT: u8 = 0x10;
}

/// GZIP member header - 10 bytes fixed prefix
pub struct GzipMemberHeader {
    pub compression_method: u8,
    pub flags: u8,
    pub mtime: u32,
    pub extra_flags: u8,
    pub os: u8,
}

impl GzipMemberHeader {
    pub const SIGNATURE: &'static [u8] = b"\x1f\x8b";
    pub const SIZE: usize = 10;
    /// CRC-32 and ISIZE at the end of the member
    pub const TRAILER_SIZE: u64 = 8;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            bail!("Truncated GZIP header");
        }

        if &data[0..2] != Self::SIGNATURE {
            bail!("Invalid GZIP header");
        }

        let mut cursor = Cursor::new(&data[2..]);

        Ok(Self {
            compression_method: cursor.read_u8()?,
            flags: cursor.read_u8()?,
            mtime: cursor.read_u32::<LittleEndian>()?,
            extra_flags: cursor.read_u8()?,
            os: cursor.read_u8()?,
        })
    }

    pub fn has(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

/// One member of an archive and where its payload lives.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Full name as stored, with `\` normalised to `/`
    pub stored_name: String,
    /// Basename of `stored_name`
    pub simple_name: String,
    /// Directory part of `stored_name`, including the trailing `/`
    pub path: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    /// Absolute offset of the first payload byte
    pub data_offset: u64,
    pub flags: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    /// Unix modification time from a GZIP header
    pub unix_mtime: Option<u32>,
    /// Lookup key after case folding and path stripping
    pub(crate) key: String,
}

impl ArchiveEntry {
    pub fn is_directory(&self) -> bool {
        self.stored_name.ends_with('/')
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }

    /// Modification time, from the GZIP header if it carries one, otherwise
    /// from the DOS date and time fields. `None` when neither is valid.
    pub fn modified(&self) -> Option<NaiveDateTime> {
        if let Some(mtime) = self.unix_mtime.filter(|&t| t != 0) {
            return DateTime::from_timestamp(i64::from(mtime), 0).map(|t| t.naive_utc());
        }

        let (year, month, day) = self.mod_date();
        let (hour, minute, second) = self.mod_time();
        NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))?.and_hms_opt(
            u32::from(hour),
            u32::from(minute),
            u32::from(second),
        )
    }

    /// Key this entry is sorted and looked up by.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Listing record returned by [`FileArchive::entries`](super::FileArchive::entries).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub path: String,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub compression_method: CompressionMethod,
    pub crc32: u32,
    pub modified: Option<NaiveDateTime>,
}

impl From<&ArchiveEntry> for EntryInfo {
    fn from(entry: &ArchiveEntry) -> Self {
        Self {
            name: entry.stored_name.clone(),
            path: entry.path.clone(),
            compressed_size: entry.compressed_size,
            uncompressed_size: entry.uncompressed_size,
            compression_method: entry.compression_method,
            crc32: entry.crc32,
            modified: entry.modified(),
        }
    }
}
