use super::ByteSource;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

/// In-memory byte source.
///
/// Owns its buffer, so a handle returned for a decompressed entry is
/// independent of the archive it came from.
pub struct MemoryFile {
    cursor: Cursor<Vec<u8>>,
    name: String,
}

impl MemoryFile {
    pub fn new(data: Vec<u8>, name: impl Into<String>) -> Self {
        Self {
            cursor: Cursor::new(data),
            name: name.into(),
        }
    }
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for MemoryFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl ByteSource for MemoryFile {
    fn size(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    fn name(&self) -> &str {
        &self.name
    }
}
