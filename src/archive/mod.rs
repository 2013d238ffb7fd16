//! Read-only archive access.
//!
//! This module turns a ZIP file, a GZIP file, or a plain directory into a
//! [`FileArchive`]: something that can open members by name.
//!
//! ## Architecture
//!
//! - [`structures`]: on-disk records (local file header, data descriptor,
//!   GZIP member header) and the [`ArchiveEntry`] they produce
//! - [`parser`]: sequential header scan that fills the index
//! - [`index`]: sorted entry registry and the name normalisation shared by
//!   inserts and lookups
//! - [`inflate`]: raw DEFLATE adapter over `flate2`
//! - [`reader`]: [`ZipReader`], the index-backed archive
//! - [`mount`]: [`MountReader`], a directory treated as an archive
//!
//! ## ZIP Format Overview
//!
//! Unlike an extractor that starts from the central directory, the scanner
//! walks local file headers from offset 0 and stops at the first record that
//! is not one. Archives that are truncated or have garbage after some members
//! still open with the members found before the damage.
//!
//! ## Limitations
//!
//! - Only STORE and DEFLATE payloads can be opened
//! - No ZIP64, encryption, or multi-disk archives
//! - GZIP files are read as a single member

mod index;
mod inflate;
mod mount;
mod parser;
mod reader;
mod structures;

pub use index::{ArchiveIndex, NameFolding, split_name};
pub use inflate::{InflateStatus, Inflated, StreamExtent, crc32, inflate_raw, measure_raw};
pub use mount::MountReader;
pub use parser::{ArchiveParser, gzip_fallback_name};
pub use reader::ZipReader;
pub use structures::*;

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::Result;
use tracing::{Span, info_span};

use crate::io::{ByteSource, LocalFile};

/// Something members can be opened from by name.
pub trait FileArchive: Send + Sync {
    /// Identifier of the archive: its file name, or the mount directory
    fn archive_name(&self) -> &str;

    /// Open a member. `None` covers both "no such member" and "could not be
    /// read"; the latter is logged.
    fn open(&self, name: &str) -> Option<Box<dyn ByteSource>>;

    fn exists(&self, name: &str) -> bool;

    /// Members with their recorded metadata, in lookup order.
    fn entries(&self) -> Vec<EntryInfo>;
}

/// Settings captured when an archive is opened.
#[derive(Debug, Clone, Default)]
pub struct ArchiveOptions {
    /// Compare names case-insensitively
    pub ignore_case: bool,
    /// Look members up by basename only
    pub ignore_paths: bool,
    /// Check CRC-32 of every entry read
    pub verify_checksums: bool,
    /// Parent for the archive's log span. `None` uses the current span.
    pub span: Option<Span>,
}

impl ArchiveOptions {
    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    pub fn with_ignore_paths(mut self, ignore_paths: bool) -> Self {
        self.ignore_paths = ignore_paths;
        self
    }

    pub fn with_verify_checksums(mut self, verify_checksums: bool) -> Self {
        self.verify_checksums = verify_checksums;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn folding(&self) -> NameFolding {
        NameFolding::new(self.ignore_case, self.ignore_paths)
    }

    pub(crate) fn archive_span(&self, name: &str) -> Span {
        match &self.span {
            Some(parent) => info_span!(parent: parent, "archive", path = %name),
            None => info_span!("archive", path = %name),
        }
    }
}

/// Container format of a byte source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Gzip,
    Unknown,
}

impl ArchiveKind {
    /// Classify by the first bytes of `source`, leaving it rewound.
    pub fn detect<S: ByteSource + ?Sized>(source: &mut S) -> Result<Self> {
        source.seek(SeekFrom::Start(0))?;
        let mut magic = [0u8; 4];
        let mut filled = 0;
        while filled < magic.len() {
            let n = source.read(&mut magic[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        source.seek(SeekFrom::Start(0))?;

        Ok(Self::from_magic(&magic[..filled]))
    }

    pub fn from_magic(magic: &[u8]) -> Self {
        if magic.starts_with(LocalFileHeader::SIGNATURE) {
            ArchiveKind::Zip
        } else if magic.starts_with(GzipMemberHeader::SIGNATURE) {
            ArchiveKind::Gzip
        } else {
            ArchiveKind::Unknown
        }
    }

    /// Guess from a file extension, case-insensitively.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
        match ext.as_str() {
            "zip" | "pk3" => Some(ArchiveKind::Zip),
            "gz" | "tgz" => Some(ArchiveKind::Gzip),
            _ => None,
        }
    }
}

/// Open `path` as an archive.
///
/// Directories are mounted; files are sniffed and scanned as ZIP or GZIP.
pub fn open_archive(path: &Path, options: &ArchiveOptions) -> Result<Box<dyn FileArchive>> {
    if path.is_dir() {
        return Ok(Box::new(MountReader::new(path, options)?));
    }

    let file = LocalFile::open(path)?;
    Ok(Box::new(ZipReader::new(file, options)?))
}
