//! # zipmount
//!
//! Read-only access to ZIP and GZIP archives, and to directories mounted as
//! if they were archives.
//!
//! An archive is scanned once when it is opened, producing a sorted index of
//! its members. Members are then opened by name on demand: stored members as
//! a bounded window over the archive file, deflated ones decompressed into
//! memory. Nothing is extracted up front.
//!
//! ## Features
//!
//! - ZIP archives read by walking local file headers, including members
//!   whose sizes live in a trailing data descriptor
//! - Single-member GZIP files
//! - STORED (uncompressed) and DEFLATE compression methods
//! - Case-insensitive and path-ignoring name lookup
//! - Directories mounted through the same [`FileArchive`] interface
//!
//! ## Example
//!
//! ```no_run
//! use std::io::Read;
//! use std::path::Path;
//! use zipmount::{ArchiveOptions, open_archive};
//!
//! fn main() -> anyhow::Result<()> {
//!     let options = ArchiveOptions::default().with_ignore_case(true);
//!     let archive = open_archive(Path::new("textures.pk3"), &options)?;
//!
//!     for entry in archive.entries() {
//!         println!("{} ({} bytes)", entry.name, entry.uncompressed_size);
//!     }
//!
//!     if let Some(mut file) = archive.open("Textures/Wall.tga") {
//!         let mut data = Vec::new();
//!         file.read_to_end(&mut data)?;
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod io;

pub use archive::{
    ArchiveEntry, ArchiveKind, ArchiveOptions, CompressionMethod, EntryInfo, FileArchive,
    MountReader, ZipReader, open_archive,
};
pub use cli::Cli;
pub use io::{ByteSource, LimitedFile, LocalFile, MemoryFile};
