use parking_lot::Mutex;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{Span, error, trace};

use super::index::{ArchiveIndex, NameFolding};
use super::inflate::{InflateStatus, crc32, inflate_raw};
use super::parser::{ArchiveParser, gzip_fallback_name};
use super::structures::{ArchiveEntry, CompressionMethod, EntryInfo};
use super::{ArchiveKind, ArchiveOptions, FileArchive};
use crate::io::{ByteSource, LimitedFile, MemoryFile, normalize_separators};

/// Index-backed reader for ZIP and GZIP archives.
///
/// The entry index is built once in [`ZipReader::new`] and never changes.
/// Every `open` decompresses from scratch; nothing is cached between calls.
///
/// ## Sharing
///
/// The archive owns one source handle. Calls that touch it (`open`,
/// `read_entry`, reads on a returned STORE window) seek and read under a
/// single mutex, so concurrent use from several threads is serialised rather
/// than interleaved. Decompressed results own their memory and are
/// independent of the archive.
pub struct ZipReader<S: ByteSource> {
    source: Arc<Mutex<S>>,
    index: ArchiveIndex,
    folding: NameFolding,
    verify_checksums: bool,
    name: String,
    span: Span,
}

impl<S: ByteSource + 'static> ZipReader<S> {
    /// Sniff the format from the first bytes and scan the archive.
    pub fn new(mut source: S, options: &ArchiveOptions) -> Result<Self> {
        let kind = ArchiveKind::detect(&mut source)?;
        Self::with_kind(source, kind, options)
    }

    /// Scan `source` as `kind`.
    ///
    /// [`ArchiveKind::Unknown`] is scanned as ZIP, which finds no entries
    /// unless the data starts with a local file header.
    pub fn with_kind(mut source: S, kind: ArchiveKind, options: &ArchiveOptions) -> Result<Self> {
        let name = normalize_separators(source.name());
        let span = options.archive_span(&name);
        let folding = options.folding();
        let mut index = ArchiveIndex::new();

        {
            let _enter = span.enter();
            let mut parser = ArchiveParser::new(&mut source, folding);
            match kind {
                ArchiveKind::Gzip => parser.scan_gzip(&mut index, &gzip_fallback_name(&name))?,
                ArchiveKind::Zip | ArchiveKind::Unknown => parser.scan_zip(&mut index)?,
            }
        }

        // prepare file index for binary search
        index.finalize_sort();

        Ok(Self {
            source: Arc::new(Mutex::new(source)),
            index,
            folding,
            verify_checksums: options.verify_checksums,
            name,
            span,
        })
    }

    /// Number of entries in the archive
    pub fn count(&self) -> usize {
        self.index.count()
    }

    /// Entry at `index` in lookup order.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.count()`.
    pub fn entry(&self, index: usize) -> &ArchiveEntry {
        self.index.get(index)
    }

    /// Entries in lookup order
    pub fn entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.index.iter()
    }

    pub fn list_entries(&self) -> Vec<EntryInfo> {
        self.index.iter().map(EntryInfo::from).collect()
    }

    pub fn archive_name(&self) -> &str {
        &self.name
    }

    /// Position of `name` in the index, after the same case folding and
    /// path stripping that was applied to the stored names.
    pub fn find_index(&self, name: &str) -> Option<usize> {
        let found = self.index.find(&self.folding.key(name));
        if found.is_none() {
            trace!(parent: &self.span, query = name, "not in archive");
        }
        found
    }

    /// Open an entry by name.
    ///
    /// Returns `None` when the name is unknown or the entry cannot be read;
    /// read failures are logged.
    pub fn open(&self, name: &str) -> Option<Box<dyn ByteSource>> {
        let index = self.find_index(name)?;
        self.open_index(index)
    }

    /// Open the entry at `index`.
    ///
    /// STORE entries come back as a window over the archive, everything else
    /// as an in-memory buffer of the decompressed bytes.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.count()`.
    pub fn open_index(&self, index: usize) -> Option<Box<dyn ByteSource>> {
        let _enter = self.span.enter();
        let entry = self.index.get(index);

        let opened: Result<Box<dyn ByteSource>> = match entry.compression_method {
            CompressionMethod::Stored if !self.verify_checksums => Ok(Box::new(LimitedFile::new(
                self.source.clone(),
                entry.data_offset,
                entry.compressed_size,
                entry.stored_name.clone(),
            ))),
            _ => self.read_entry(index).map(|data| -> Box<dyn ByteSource> {
                Box::new(MemoryFile::new(data, entry.stored_name.clone()))
            }),
        };

        match opened {
            Ok(file) => Some(file),
            Err(e) => {
                error!(entry = %entry.stored_name, "{e:#}");
                None
            }
        }
    }

    /// Read and decompress the entry at `index` into a new buffer.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.count()`.
    pub fn read_entry(&self, index: usize) -> Result<Vec<u8>> {
        let entry = self.index.get(index);

        let data = match entry.compression_method {
            CompressionMethod::Stored => self.read_raw(entry)?,
            CompressionMethod::Deflate => self.inflate(entry)?,
            CompressionMethod::Unknown(method) => bail!(
                "file has unsupported compression method {method}: {}",
                entry.stored_name
            ),
        };

        if self.verify_checksums {
            let actual = crc32(&data);
            if actual != entry.crc32 {
                bail!(
                    "CRC mismatch for {}: expected {:08x}, got {:08x}",
                    entry.stored_name,
                    entry.crc32,
                    actual
                );
            }
        }

        Ok(data)
    }

    /// Copy the stored payload bytes of `entry`.
    fn read_raw(&self, entry: &ArchiveEntry) -> Result<Vec<u8>> {
        let mut buf = alloc_buffer(entry.compressed_size, &entry.stored_name)?;

        let mut source = self.source.lock();
        source.seek(SeekFrom::Start(entry.data_offset))?;
        source
            .read_exact(&mut buf)
            .with_context(|| format!("truncated payload for {}", entry.stored_name))?;

        Ok(buf)
    }

    fn inflate(&self, entry: &ArchiveEntry) -> Result<Vec<u8>> {
        let mut output = alloc_buffer(entry.uncompressed_size, &entry.stored_name)?;
        let input = self.read_raw(entry)?;

        let result = inflate_raw(&input, &mut output)
            .with_context(|| format!("error decompressing {}", entry.stored_name))?;
        if result.status != InflateStatus::StreamEnd {
            bail!(
                "error decompressing {}: stream does not end within the recorded {} bytes",
                entry.stored_name,
                output.len()
            );
        }
        if result.written != output.len() {
            bail!(
                "error decompressing {}: produced {} of {} bytes",
                entry.stored_name,
                result.written,
                output.len()
            );
        }

        Ok(output)
    }
}

/// Zero-filled buffer of `len` bytes, failing instead of aborting when the
/// allocation cannot be made.
fn alloc_buffer(len: u64, name: &str) -> Result<Vec<u8>> {
    let len = usize::try_from(len)
        .with_context(|| format!("not enough memory for decompressing {name}"))?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .with_context(|| format!("not enough memory for decompressing {name}"))?;
    buf.resize(len, 0);
    Ok(buf)
}

impl<S: ByteSource + 'static> FileArchive for ZipReader<S> {
    fn archive_name(&self) -> &str {
        ZipReader::archive_name(self)
    }

    fn open(&self, name: &str) -> Option<Box<dyn ByteSource>> {
        ZipReader::open(self, name)
    }

    fn exists(&self, name: &str) -> bool {
        self.find_index(name).is_some()
    }

    fn entries(&self) -> Vec<EntryInfo> {
        self.list_entries()
    }
}
