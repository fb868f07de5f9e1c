//! In-memory model of an app bundle
//!
//! An [`AppBundle`] owns paths and resource tables but never file bytes:
//! each [`ModuleEntry`] carries a content handle that is resolved through an
//! [`EntryStore`] when a stage actually needs the data.

use crate::table::ResourceTable;
use crate::zip_path;
use crate::Result;
use md5::{Digest, Md5};
use std::io::{self, Read};

/// Where an entry's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryContent {
    /// Stored in the source archive under this name.
    Archived { source_name: String },
    /// Produced during the run.
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEntry {
    /// Path relative to the owning module (or to `BUNDLE-METADATA` for
    /// metadata entries, or to the archive root for root entries).
    pub path: String,
    pub content: EntryContent,
}

impl ModuleEntry {
    /// Entry whose bytes stay in the input archive under `source_name`.
    pub fn archived(path: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: EntryContent::Archived {
                source_name: source_name.into(),
            },
        }
    }

    /// Entry backed by bytes produced during the run.
    pub fn bytes(path: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            content: EntryContent::Bytes(bytes),
        }
    }

    /// Same content under another path.
    pub fn relocated(&self, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: self.content.clone(),
        }
    }

    /// Whether the entry lives under `res/`.
    pub fn is_resource(&self) -> bool {
        zip_path::starts_with(&self.path, zip_path::RESOURCES_DIRECTORY)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleModule {
    pub name: String,
    /// Decoded resource table, if the module carries one.
    pub table: Option<ResourceTable>,
    /// Physical entries in archive order, excluding the table file.
    pub entries: Vec<ModuleEntry>,
}

impl BundleModule {
    /// `module/path`, the key used for entry-path mappings.
    pub fn qualified_path(&self, path: &str) -> String {
        zip_path::join(&self.name, path)
    }

    /// Entries under `res/`, in archive order.
    pub fn resource_entries(&self) -> impl Iterator<Item = &ModuleEntry> + '_ {
        self.entries.iter().filter(|entry| entry.is_resource())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppBundle {
    pub modules: Vec<BundleModule>,
    pub metadata: Vec<ModuleEntry>,
    pub root_entries: Vec<ModuleEntry>,
}

impl AppBundle {
    /// Total number of entries across modules, metadata and root.
    pub fn entry_count(&self) -> usize {
        self.modules.iter().map(|m| m.entries.len()).sum::<usize>()
            + self.metadata.len()
            + self.root_entries.len()
    }
}

/// Resolves entry content handles.
pub trait EntryStore {
    /// Opens an entry of the source archive for reading.
    fn open(&mut self, source_name: &str) -> Result<Box<dyn Read + '_>>;

    /// Uncompressed size of an entry of the source archive.
    fn archived_size(&mut self, source_name: &str) -> Result<u64>;

    fn read(&mut self, content: &EntryContent) -> Result<Vec<u8>> {
        match content {
            EntryContent::Bytes(bytes) => Ok(bytes.clone()),
            EntryContent::Archived { source_name } => {
                let mut buf = Vec::new();
                self.open(source_name)?.read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }

    /// Hex MD5 of the content, streamed for archived entries.
    fn md5(&mut self, content: &EntryContent) -> Result<String> {
        let mut hasher = Md5::new();
        match content {
            EntryContent::Bytes(bytes) => hasher.update(bytes),
            EntryContent::Archived { source_name } => {
                io::copy(&mut self.open(source_name)?, &mut hasher)?;
            }
        }
        Ok(hex::encode(hasher.finalize()))
    }

    fn size(&mut self, content: &EntryContent) -> Result<u64> {
        match content {
            EntryContent::Bytes(bytes) => Ok(bytes.len() as u64),
            EntryContent::Archived { source_name } => self.archived_size(source_name),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::GuardError;
    use std::collections::HashMap;

    /// Store backed by a map of source names to bytes.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub files: HashMap<String, Vec<u8>>,
    }

    impl MemoryStore {
        pub fn with(mut self, name: &str, bytes: &[u8]) -> Self {
            self.files.insert(name.to_string(), bytes.to_vec());
            self
        }
    }

    impl EntryStore for MemoryStore {
        fn open(&mut self, source_name: &str) -> Result<Box<dyn Read + '_>> {
            match self.files.get(source_name) {
                Some(bytes) => Ok(Box::new(bytes.as_slice())),
                None => Err(GuardError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    source_name.to_string(),
                ))),
            }
        }

        fn archived_size(&mut self, source_name: &str) -> Result<u64> {
            self.files
                .get(source_name)
                .map(|bytes| bytes.len() as u64)
                .ok_or_else(|| {
                    GuardError::Io(io::Error::new(io::ErrorKind::NotFound, source_name.to_string()))
                })
        }
    }

    #[test]
    fn test_md5_matches_for_both_content_kinds() {
        let mut store = MemoryStore::default().with("base/res/a.png", b"hello");
        let archived = EntryContent::Archived {
            source_name: "base/res/a.png".into(),
        };
        let inline = EntryContent::Bytes(b"hello".to_vec());
        let expected = "5d41402abc4b2a76b9719d911017c592";
        assert_eq!(store.md5(&archived).unwrap(), expected);
        assert_eq!(store.md5(&inline).unwrap(), expected);
        assert_eq!(store.size(&archived).unwrap(), 5);
        assert_eq!(store.read(&archived).unwrap(), b"hello");
    }

    #[test]
    fn test_relocation_keeps_content_handle() {
        let entry = ModuleEntry::archived("res/drawable/icon.png", "base/res/drawable/icon.png");
        let moved = entry.relocated("res/a/a.png");
        assert_eq!(moved.path, "res/a/a.png");
        assert_eq!(moved.content, entry.content);
        assert!(moved.is_resource());
        assert!(!ModuleEntry::bytes("resources.json", vec![]).is_resource());
    }
}
