use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{Span, debug, trace};

use super::structures::EntryInfo;
use super::{ArchiveOptions, FileArchive};
use crate::io::{ByteSource, LocalFile, normalize_separators};

/// A real directory presented as an archive.
///
/// There is no index: a name exists when `<base>/<name>` can be opened.
/// Names are used as given; case folding and path stripping from
/// [`ArchiveOptions`] do not apply here.
pub struct MountReader {
    base: PathBuf,
    name: String,
    span: Span,
}

impl MountReader {
    pub fn new(dir: &Path, options: &ArchiveOptions) -> Result<Self> {
        let base = std::path::absolute(dir)
            .with_context(|| format!("cannot resolve {}", dir.display()))?;
        if !base.is_dir() {
            bail!("{} is not a directory", base.display());
        }

        let mut name = normalize_separators(&base.to_string_lossy());
        if !name.ends_with('/') {
            name.push('/');
        }
        let span = options.archive_span(&name);
        debug!(parent: &span, "mounted directory");

        Ok(Self { base, name, span })
    }

    /// Absolute mount directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Open `<base>/<name>`.
    ///
    /// Empty names and names that would leave the mount (absolute paths,
    /// `..` components) are not found.
    pub fn open(&self, name: &str) -> Option<Box<dyn ByteSource>> {
        let relative = normalize_separators(name);
        if relative.is_empty() {
            return None;
        }
        let escapes = Path::new(&relative).components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes {
            debug!(parent: &self.span, query = name, "refusing path outside mount");
            return None;
        }

        match LocalFile::with_name(&self.base.join(&relative), relative) {
            Ok(file) => Some(Box::new(file)),
            Err(e) => {
                trace!(parent: &self.span, query = name, "not in mount: {e:#}");
                None
            }
        }
    }

    /// Whether `name` can be opened. Opens and immediately releases it.
    pub fn exists(&self, name: &str) -> bool {
        self.open(name).is_some()
    }
}

impl FileArchive for MountReader {
    fn archive_name(&self) -> &str {
        &self.name
    }

    fn open(&self, name: &str) -> Option<Box<dyn ByteSource>> {
        MountReader::open(self, name)
    }

    fn exists(&self, name: &str) -> bool {
        MountReader::exists(self, name)
    }

    /// Nothing is precomputed for a mount.
    fn entries(&self) -> Vec<EntryInfo> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn opens_relative_names_and_reports_requested_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/data.bin"), b"mounted").unwrap();

        let mount = MountReader::new(dir.path(), &ArchiveOptions::default()).unwrap();
        let mut file = mount.open("sub\\data.bin").unwrap();
        assert_eq!(file.name(), "sub/data.bin");
        assert_eq!(file.size(), 7);

        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        assert_eq!(out, "mounted");
    }

    #[test]
    fn archive_name_ends_with_separator() {
        let dir = tempfile::tempdir().unwrap();
        let mount = MountReader::new(dir.path(), &ArchiveOptions::default()).unwrap();
        assert!(FileArchive::archive_name(&mount).ends_with('/'));
        assert!(mount.base().is_absolute());
        assert!(mount.base().is_dir());
    }

    #[test]
    fn rejects_escaping_and_empty_names() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("inner");
        std::fs::create_dir(&inner).unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"x").unwrap();

        let mount = MountReader::new(&inner, &ArchiveOptions::default()).unwrap();
        assert!(!mount.exists("../secret.txt"));
        assert!(!mount.exists(""));
        assert!(!mount.exists("/etc/hostname"));
    }

    #[test]
    fn directories_are_not_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let mount = MountReader::new(dir.path(), &ArchiveOptions::default()).unwrap();
        assert!(!mount.exists("nested"));
    }

    #[test]
    fn file_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, b"x").unwrap();
        assert!(MountReader::new(&file, &ArchiveOptions::default()).is_err());
    }
}
