//! Reading the input archive

use crate::bundle::{AppBundle, BundleModule, EntryStore, ModuleEntry};
use crate::codec::TableCodec;
use crate::zip_path::METADATA_DIRECTORY;
use crate::{GuardError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::read::ZipFile;
use zip::ZipArchive;

/// Root directories that belong to the archive itself rather than a module.
const ROOT_DIRECTORIES: &[&str] = &["META-INF"];

/// The opened input archive.
pub struct BundleSource {
    path: PathBuf,
    archive: ZipArchive<File>,
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl BundleSource {
    /// Opens the archive and indexes its entry names.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)?;
        let mut names = Vec::with_capacity(archive.len());
        let mut index = HashMap::with_capacity(archive.len());
        for i in 0..archive.len() {
            let name = archive.by_index_raw(i)?.name().to_string();
            index.insert(name.clone(), i);
            names.push(name);
        }
        Ok(Self {
            path: path.to_path_buf(),
            archive,
            names,
            index,
        })
    }

    /// Size of the archive file on disk.
    pub fn file_size(&self) -> Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    /// Splits the archive into modules, metadata and root entries, decoding
    /// each module's resource table with `codec`.
    pub fn analyze(&mut self, codec: &dyn TableCodec) -> Result<AppBundle> {
        let mut bundle = AppBundle::default();
        let names = self.names.clone();
        for name in names {
            if name.ends_with('/') {
                continue;
            }
            let (top, rest) = match name.split_once('/') {
                Some(split) => split,
                None => {
                    bundle.root_entries.push(ModuleEntry::archived(name.as_str(), name.as_str()));
                    continue;
                }
            };
            if top == METADATA_DIRECTORY {
                bundle.metadata.push(ModuleEntry::archived(rest, name.as_str()));
                continue;
            }
            if ROOT_DIRECTORIES.contains(&top) {
                bundle.root_entries.push(ModuleEntry::archived(name.as_str(), name.as_str()));
                continue;
            }

            let position = match bundle.modules.iter().position(|m| m.name == top) {
                Some(position) => position,
                None => {
                    bundle.modules.push(BundleModule {
                        name: top.to_string(),
                        table: None,
                        entries: Vec::new(),
                    });
                    bundle.modules.len() - 1
                }
            };
            if rest == codec.file_name() {
                let mut bytes = Vec::new();
                self.open(&name)?.read_to_end(&mut bytes)?;
                let table = codec.decode(&bytes).map_err(|err| match err {
                    GuardError::Integrity(reason) => {
                        GuardError::Integrity(format!("{}: {}", name, reason))
                    }
                    other => other,
                })?;
                bundle.modules[position].table = Some(table);
            } else {
                bundle.modules[position]
                    .entries
                    .push(ModuleEntry::archived(rest, name.as_str()));
            }
        }

        for module in &bundle.modules {
            debug!(
                module = %module.name,
                entries = module.entries.len(),
                has_table = module.table.is_some(),
                "analyzed module"
            );
        }
        info!(
            path = %self.path.display(),
            modules = bundle.modules.len(),
            entries = bundle.entry_count(),
            "analyzed bundle"
        );
        Ok(bundle)
    }

    fn index_of(&self, source_name: &str) -> Result<usize> {
        self.index.get(source_name).copied().ok_or_else(|| {
            GuardError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} has no entry `{}`", self.path.display(), source_name),
            ))
        })
    }

    /// Entry with its compressed data untouched, for verbatim copying.
    pub fn raw_entry(&mut self, source_name: &str) -> Result<ZipFile<'_>> {
        let idx = self.index_of(source_name)?;
        Ok(self.archive.by_index_raw(idx)?)
    }
}

impl EntryStore for BundleSource {
    fn open(&mut self, source_name: &str) -> Result<Box<dyn Read + '_>> {
        let idx = self.index_of(source_name)?;
        Ok(Box::new(self.archive.by_index(idx)?))
    }

    fn archived_size(&mut self, source_name: &str) -> Result<u64> {
        let idx = self.index_of(source_name)?;
        Ok(self.archive.by_index_raw(idx)?.size())
    }
}
