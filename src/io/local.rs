use super::{ByteSource, normalize_separators};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Local file reader with random access support
pub struct LocalFile {
    file: File,
    size: u64,
    name: String,
}

impl LocalFile {
    pub fn open(path: &Path) -> Result<Self> {
        let name = normalize_separators(&path.to_string_lossy());
        Self::with_name(path, name)
    }

    /// Open `path` but report `name` from [`ByteSource::name`].
    ///
    /// Mounted directories use this so a handle carries the name it was
    /// requested by rather than the real location on disk.
    pub fn with_name(path: &Path, name: impl Into<String>) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let metadata = file.metadata()?;
        if metadata.is_dir() {
            anyhow::bail!("{} is a directory", path.display());
        }
        Ok(Self {
            file,
            size: metadata.len(),
            name: name.into(),
        })
    }
}

impl Read for LocalFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for LocalFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl ByteSource for LocalFile {
    fn size(&self) -> u64 {
        self.size
    }

    fn name(&self) -> &str {
        &self.name
    }
}
