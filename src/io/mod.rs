mod limit;
mod local;
mod memory;

pub use limit::LimitedFile;
pub use local::LocalFile;
pub use memory::MemoryFile;

use std::io::{Read, Seek};

/// Trait for random access reading from a data source.
///
/// Positioning comes from [`Seek`]: absolute seeks use `SeekFrom::Start`,
/// relative ones `SeekFrom::Current`, and the current offset is
/// `stream_position()`.
pub trait ByteSource: Read + Seek + Send {
    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Identifier of the source, usually a file name
    fn name(&self) -> &str;
}

impl<T: ByteSource + ?Sized> ByteSource for Box<T> {
    fn size(&self) -> u64 {
        (**self).size()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Normalise Windows separators so names compare the same on every host.
pub(crate) fn normalize_separators(name: &str) -> String {
    name.replace('\\', "/")
}
