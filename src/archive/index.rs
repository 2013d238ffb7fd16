//! Sorted registry of archive members.
//!
//! Entries are appended in scan order, sorted once when scanning is done and
//! looked up by binary search afterwards. Both sides of the lookup go through
//! [`NameFolding::key`], so stored names and queries are always normalised
//! the same way.

use super::structures::ArchiveEntry;
use crate::io::normalize_separators;

/// Name normalisation captured from the archive options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NameFolding {
    pub ignore_case: bool,
    pub ignore_paths: bool,
}

impl NameFolding {
    pub fn new(ignore_case: bool, ignore_paths: bool) -> Self {
        Self {
            ignore_case,
            ignore_paths,
        }
    }

    /// Lookup key for a stored name or a query.
    pub fn key(&self, name: &str) -> String {
        let name = normalize_separators(name);
        let name = if self.ignore_paths {
            split_name(&name).0.to_string()
        } else {
            name
        };
        if self.ignore_case {
            name.to_lowercase()
        } else {
            name
        }
    }
}

/// Split a normalised name into `(basename, directory)`.
///
/// The directory keeps its trailing `/`; a name without one has an empty
/// directory.
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('/') {
        Some(pos) => (&name[pos + 1..], &name[..=pos]),
        None => (name, ""),
    }
}

#[derive(Debug, Default)]
pub struct ArchiveIndex {
    entries: Vec<ArchiveEntry>,
    sorted: bool,
}

impl ArchiveIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: ArchiveEntry) {
        debug_assert!(!self.sorted, "append after finalize_sort");
        self.entries.push(entry);
    }

    /// Establish the lookup order.
    ///
    /// The sort is stable, so entries sharing a key stay in scan order and
    /// lookups return the earliest one.
    pub fn finalize_sort(&mut self) {
        self.entries.sort_by(|a, b| a.key.cmp(&b.key));
        self.sorted = true;
    }

    /// Position of the first entry whose key equals `key`.
    pub fn find(&self, key: &str) -> Option<usize> {
        debug_assert!(self.sorted, "lookup before finalize_sort");
        let pos = self
            .entries
            .partition_point(|entry| entry.key.as_str() < key);
        match self.entries.get(pos) {
            Some(entry) if entry.key == key => Some(pos),
            _ => None,
        }
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// # Panics
    ///
    /// Panics if `index >= self.count()`.
    pub fn get(&self, index: usize) -> &ArchiveEntry {
        &self.entries[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter()
    }
}
