use super::ByteSource;
use parking_lot::Mutex;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

/// Bounded window over a shared source.
///
/// Covers `[offset, offset + len)` of the parent. The window keeps its own
/// position and re-seeks the parent under the lock on every read, so
/// several windows over one archive never observe each other's cursor.
pub struct LimitedFile<S: ByteSource> {
    source: Arc<Mutex<S>>,
    offset: u64,
    len: u64,
    pos: u64,
    name: String,
}

impl<S: ByteSource> LimitedFile<S> {
    pub fn new(source: Arc<Mutex<S>>, offset: u64, len: u64, name: impl Into<String>) -> Self {
        Self {
            source,
            offset,
            len,
            pos: 0,
            name: name.into(),
        }
    }
}

impl<S: ByteSource> Read for LimitedFile<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.len.saturating_sub(self.pos);
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));

        let mut source = self.source.lock();
        source.seek(SeekFrom::Start(self.offset + self.pos))?;
        let n = source.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<S: ByteSource> Seek for LimitedFile<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
        };
        match target {
            Some(n) if n <= self.len => {
                self.pos = n;
                Ok(n)
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek outside of the entry window",
            )),
        }
    }
}

impl<S: ByteSource> ByteSource for LimitedFile<S> {
    fn size(&self) -> u64 {
        self.len
    }

    fn name(&self) -> &str {
        &self.name
    }
}
