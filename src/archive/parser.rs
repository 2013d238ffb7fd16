//! Sequential archive header scanner.
//!
//! This module walks a [`ByteSource`] from the front and turns every record it
//! recognises into an [`ArchiveEntry`].
//!
//! ## Parsing Strategy
//!
//! ZIP archives are read local header by local header:
//! 1. Read the 30-byte local file header
//! 2. Stop at the first signature that is not `PK\x03\x04` (central directory,
//!    end record, or garbage)
//! 3. Read the name, skip the extra field, note the payload offset
//! 4. Skip the payload, resolving its length first when the sizes were
//!    deferred to a data descriptor
//!
//! GZIP files hold exactly one member; its sizes come from the 8-byte trailer
//! at the end of the file.
//!
//! A record that cannot be parsed ends the scan; everything found before it
//! stays in the index.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Read, Seek, SeekFrom};

use anyhow::{Context, Result, bail};
use tracing::{debug, trace, warn};

use super::index::{ArchiveIndex, NameFolding, split_name};
use super::inflate::measure_raw;
use super::structures::*;
use crate::io::{ByteSource, normalize_separators};

/// Bytes inspected per read while searching for a data descriptor.
const DESCRIPTOR_SCAN_CHUNK: usize = 64 * 1024;

/// Low-level archive scanner.
///
/// Borrows the source for the duration of the scan; the caller owns it
/// before and after.
pub struct ArchiveParser<'a, S: ByteSource> {
    source: &'a mut S,
    folding: NameFolding,
    size: u64,
}

impl<'a, S: ByteSource> ArchiveParser<'a, S> {
    pub fn new(source: &'a mut S, folding: NameFolding) -> Self {
        let size = source.size();
        Self {
            source,
            folding,
            size,
        }
    }

    /// Append every local file header entry to `index`.
    ///
    /// Only failing to rewind the source is an error.
    pub fn scan_zip(&mut self, index: &mut ArchiveIndex) -> Result<()> {
        self.source.seek(SeekFrom::Start(0))?;

        loop {
            let record_offset = self.source.stream_position()?;
            match self.next_zip_entry() {
                Ok(Some(entry)) => {
                    debug!(
                        entry = %entry.stored_name,
                        method = entry.compression_method.as_u16(),
                        offset = entry.data_offset,
                        size = entry.compressed_size,
                        "added file from archive"
                    );
                    index.append(entry);
                }
                Ok(None) => {
                    trace!(offset = record_offset, "no more local file headers");
                    break;
                }
                Err(e) => {
                    warn!(
                        offset = record_offset,
                        "stopped scanning archive: {e:#}"
                    );
                    break;
                }
            }
        }

        debug!(entries = index.count(), "zip scan finished");
        Ok(())
    }

    /// Read one local file header and skip past its payload.
    ///
    /// Returns `Ok(None)` when the next record is not a local file header.
    pub fn next_zip_entry(&mut self) -> Result<Option<ArchiveEntry>> {
        let mut raw = [0u8; LocalFileHeader::SIZE];
        let n = read_up_to(&mut *self.source, &mut raw)?;
        if n < 4 || &raw[..4] != LocalFileHeader::SIGNATURE {
            return Ok(None);
        }
        if n < LocalFileHeader::SIZE {
            bail!("truncated local file header");
        }
        let header = LocalFileHeader::from_bytes(&raw)?;

        let mut name_bytes = vec![0u8; header.file_name_length as usize];
        self.source
            .read_exact(&mut name_bytes)
            .context("truncated file name")?;
        // Use lossy conversion to handle non-UTF8 filenames gracefully
        let stored_name = String::from_utf8_lossy(&name_bytes).to_string();

        if header.extra_field_length > 0 {
            self.source
                .seek(SeekFrom::Current(i64::from(header.extra_field_length)))?;
        }

        let data_offset = self.source.stream_position()?;
        let method = CompressionMethod::from_u16(header.compression_method);
        let mut entry = new_entry(stored_name, self.folding);
        entry.compression_method = method;
        entry.data_offset = data_offset;
        entry.flags = header.flags;
        entry.last_mod_time = header.last_mod_time;
        entry.last_mod_date = header.last_mod_date;

        let next_record = if header.has_data_descriptor() {
            let (descriptor, end) = self
                .resolve_descriptor(method, data_offset)
                .with_context(|| format!("unresolved data descriptor for {}", entry.stored_name))?;
            entry.crc32 = descriptor.crc32;
            entry.compressed_size = u64::from(descriptor.compressed_size);
            entry.uncompressed_size = u64::from(descriptor.uncompressed_size);
            end
        } else {
            entry.crc32 = header.crc32;
            entry.compressed_size = u64::from(header.compressed_size);
            entry.uncompressed_size = u64::from(header.uncompressed_size);
            data_offset + entry.compressed_size
        };

        if next_record > self.size {
            bail!("payload of {} runs past end of archive", entry.stored_name);
        }
        self.source.seek(SeekFrom::Start(next_record))?;

        Ok(Some(entry))
    }

    /// Locate the descriptor that follows a payload of unknown length.
    ///
    /// Returns the descriptor and the offset just past it.
    fn resolve_descriptor(
        &mut self,
        method: CompressionMethod,
        data_offset: u64,
    ) -> Result<(DataDescriptor, u64)> {
        match method {
            CompressionMethod::Deflate => {
                self.source.seek(SeekFrom::Start(data_offset))?;
                let extent = measure_raw(&mut *self.source)?;
                let payload_end = data_offset + extent.compressed_size;
                trace!(
                    compressed = extent.compressed_size,
                    uncompressed = extent.uncompressed_size,
                    "measured deferred deflate payload"
                );

                self.source.seek(SeekFrom::Start(payload_end))?;
                let mut raw = [0u8; 4 + DataDescriptor::SIZE];
                let n = read_up_to(&mut *self.source, &mut raw)?;
                let (body, len) = if n >= raw.len() && &raw[..4] == DataDescriptor::SIGNATURE {
                    (&raw[4..], raw.len())
                } else if n >= DataDescriptor::SIZE {
                    (&raw[..DataDescriptor::SIZE], DataDescriptor::SIZE)
                } else {
                    bail!("truncated data descriptor");
                };
                let descriptor = DataDescriptor::from_bytes(body)?;

                if u64::from(descriptor.compressed_size) != extent.compressed_size {
                    warn!(
                        recorded = descriptor.compressed_size,
                        measured = extent.compressed_size,
                        "data descriptor disagrees with payload, using measured sizes"
                    );
                    let measured = DataDescriptor {
                        crc32: extent.crc32,
                        compressed_size: u32::try_from(extent.compressed_size)?,
                        uncompressed_size: u32::try_from(extent.uncompressed_size)?,
                    };
                    return Ok((measured, payload_end + len as u64));
                }
                Ok((descriptor, payload_end + len as u64))
            }
            _ => self.find_signed_descriptor(data_offset),
        }
    }

    /// Scan forward for a `PK\x07\x08` descriptor whose compressed size
    /// equals its distance from `data_offset`.
    fn find_signed_descriptor(&mut self, data_offset: u64) -> Result<(DataDescriptor, u64)> {
        const RECORD: usize = 4 + DataDescriptor::SIZE;
        let mut buf = vec![0u8; DESCRIPTOR_SCAN_CHUNK + RECORD - 1];
        let mut pos = data_offset;

        loop {
            self.source.seek(SeekFrom::Start(pos))?;
            let n = read_up_to(&mut *self.source, &mut buf)?;
            if n < RECORD {
                bail!("no data descriptor signature after payload");
            }

            for i in 0..=n - RECORD {
                if &buf[i..i + 4] != DataDescriptor::SIGNATURE {
                    continue;
                }
                let descriptor = DataDescriptor::from_bytes(&buf[i + 4..i + RECORD])?;
                let distance = pos + i as u64 - data_offset;
                if u64::from(descriptor.compressed_size) == distance {
                    return Ok((descriptor, pos + (i + RECORD) as u64));
                }
            }

            pos += (n - RECORD + 1) as u64;
        }
    }

    /// Parse the single GZIP member and append its entry to `index`.
    ///
    /// `fallback_name` names the entry when the header carries no file name.
    pub fn scan_gzip(&mut self, index: &mut ArchiveIndex, fallback_name: &str) -> Result<()> {
        self.source.seek(SeekFrom::Start(0))?;

        match self.gzip_entry(fallback_name) {
            Ok(Some(entry)) => {
                debug!(
                    entry = %entry.stored_name,
                    offset = entry.data_offset,
                    size = entry.compressed_size,
                    "added gzip member"
                );
                index.append(entry);
            }
            Ok(None) => trace!("not a gzip member"),
            Err(e) => warn!("stopped scanning gzip member: {e:#}"),
        }
        Ok(())
    }

    fn gzip_entry(&mut self, fallback_name: &str) -> Result<Option<ArchiveEntry>> {
        let mut raw = [0u8; GzipMemberHeader::SIZE];
        let n = read_up_to(&mut *self.source, &mut raw)?;
        if n < GzipMemberHeader::SIZE || &raw[..2] != GzipMemberHeader::SIGNATURE {
            return Ok(None);
        }
        let header = GzipMemberHeader::from_bytes(&raw)?;

        if header.has(gzip_flags::FEXTRA) {
            let len = self.source.read_u16::<LittleEndian>()?;
            self.source.seek(SeekFrom::Current(i64::from(len)))?;
        }

        let name = if header.has(gzip_flags::FNAME) {
            read_cstring(&mut *self.source).context("truncated gzip file name")?
        } else {
            fallback_name.to_string()
        };

        if header.has(gzip_flags::FCOMMENT) {
            read_cstring(&mut *self.source).context("truncated gzip comment")?;
        }

        if header.has(gzip_flags::FHCRC) {
            self.source.seek(SeekFrom::Current(2))?;
        }

        let data_offset = self.source.stream_position()?;
        let Some(compressed_size) = self
            .size
            .checked_sub(GzipMemberHeader::TRAILER_SIZE)
            .and_then(|end| end.checked_sub(data_offset))
        else {
            bail!("gzip member has no room for its trailer");
        };

        self.source
            .seek(SeekFrom::Start(data_offset + compressed_size))?;
        let crc32 = self.source.read_u32::<LittleEndian>()?;
        let uncompressed_size = self.source.read_u32::<LittleEndian>()?;

        let mut entry = new_entry(name, self.folding);
        entry.compression_method = CompressionMethod::from_u16(u16::from(header.compression_method));
        entry.data_offset = data_offset;
        entry.compressed_size = compressed_size;
        entry.uncompressed_size = u64::from(uncompressed_size);
        entry.crc32 = crc32;
        entry.unix_mtime = Some(header.mtime);

        Ok(Some(entry))
    }
}

/// Name for a GZIP member without FNAME: the archive's basename minus its
/// last extension.
pub fn gzip_fallback_name(archive_name: &str) -> String {
    let normalized = normalize_separators(archive_name);
    let base = split_name(&normalized).0;
    match base.rfind('.') {
        Some(dot) if dot > 0 => base[..dot].to_string(),
        _ => base.to_string(),
    }
}

fn new_entry(stored_name: String, folding: NameFolding) -> ArchiveEntry {
    let stored_name = normalize_separators(&stored_name);
    let (simple, path) = split_name(&stored_name);
    ArchiveEntry {
        simple_name: simple.to_string(),
        path: path.to_string(),
        key: folding.key(&stored_name),
        stored_name,
        compression_method: CompressionMethod::Stored,
        compressed_size: 0,
        uncompressed_size: 0,
        crc32: 0,
        data_offset: 0,
        flags: 0,
        last_mod_time: 0,
        last_mod_date: 0,
        unix_mtime: None,
    }
}

/// Fill `buf` as far as the source allows.
fn read_up_to<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn read_cstring<R: Read + ?Sized>(reader: &mut R) -> io::Result<String> {
    let mut bytes = Vec::new();
    loop {
        match reader.read_u8()? {
            0 => break,
            b => bytes.push(b),
        }
    }
    Ok(String::from_utf8_lossy(&bytes).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryFile;

    #[test]
    fn fallback_name_drops_last_extension() {
        assert_eq!(gzip_fallback_name("data/logs/app.log.gz"), "app.log");
        assert_eq!(gzip_fallback_name("C:\\tmp\\notes.gz"), "notes");
        assert_eq!(gzip_fallback_name("archive"), "archive");
        assert_eq!(gzip_fallback_name(".hidden"), ".hidden");
    }

    #[test]
    fn empty_source_yields_no_entries() {
        let mut source = MemoryFile::new(Vec::new(), "empty.zip");
        let mut index = ArchiveIndex::new();
        ArchiveParser::new(&mut source, NameFolding::default())
            .scan_zip(&mut index)
            .unwrap();
        assert_eq!(index.count(), 0);
    }

    #[test]
    fn end_of_central_directory_stops_scan() {
        let mut data = b"PK\x05\x06".to_vec();
        data.extend_from_slice(&[0u8; 18]);
        let mut source = MemoryFile::new(data, "eocd.zip");
        let mut parser = ArchiveParser::new(&mut source, NameFolding::default());
        assert!(parser.next_zip_entry().unwrap().is_none());
    }

    #[test]
    fn read_cstring_stops_at_nul() {
        let mut cursor = io::Cursor::new(b"name.txt\0rest".to_vec());
        assert_eq!(read_cstring(&mut cursor).unwrap(), "name.txt");
        assert_eq!(cursor.position(), 9);
    }
}
