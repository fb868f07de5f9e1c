//! Content-hash deduplication of resource files

use crate::bundle::{AppBundle, BundleModule, EntryStore};
use crate::report::format_size;
use crate::table::Entry;
use crate::Result;
use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// One dropped file and the copy its references now point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateRecord {
    pub discarded: String,
    pub kept: String,
    pub size: u64,
}

/// What was merged in one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub module: String,
    pub duplicates: Vec<DuplicateRecord>,
}

impl MergeReport {
    pub const LOG_SUFFIX: &'static str = "-duplicate.txt";

    /// Number of files dropped.
    pub fn removed_count(&self) -> usize {
        self.duplicates.len()
    }

    /// Bytes saved by the dropped files.
    pub fn removed_size(&self) -> u64 {
        self.duplicates.iter().map(|d| d.size).sum()
    }

    /// Name of this module's duplicate log, `<module>-duplicate.txt`.
    pub fn log_file_name(&self) -> String {
        log_file_name(&self.module)
    }

    /// Renders the duplicate log.
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<()> {
        writeln!(out, "res filter path mapping:")?;
        for duplicate in &self.duplicates {
            writeln!(
                out,
                "\t{} -> {} (size {})",
                duplicate.discarded,
                duplicate.kept,
                format_size(duplicate.size)
            )?;
        }
        write!(
            out,
            "removed: count({}), totalSize({})",
            self.removed_count(),
            format_size(self.removed_size())
        )?;
        out.flush()?;
        Ok(())
    }

    /// Writes the log into a temporary file in `dir`, to be moved onto
    /// [`MergeReport::log_file_name`] once the output is published.
    pub fn stage_in(&self, dir: &Path) -> Result<NamedTempFile> {
        fs::create_dir_all(dir)?;
        let mut temp = NamedTempFile::new_in(dir)?;
        self.write_to(BufWriter::new(temp.as_file_mut()))?;
        Ok(temp)
    }
}

fn log_file_name(module: &str) -> String {
    format!("{}{}", module, MergeReport::LOG_SUFFIX)
}

/// Deletes the duplicate log a previous run left for `module`, if any.
pub fn remove_stale_log(dir: &Path, module: &str) -> Result<()> {
    let path = dir.join(log_file_name(module));
    if path.exists() {
        debug!(path = %path.display(), "deleting existing log file");
        fs::remove_file(&path)?;
    }
    Ok(())
}

/// Keeps the first copy of every distinct resource file per module and
/// points all references at it.
#[derive(Debug, Default)]
pub struct DuplicateResourceMerger;

impl DuplicateResourceMerger {
    pub fn new() -> Self {
        Self
    }

    /// Deduplicates every module that has a resource table and files.
    pub fn merge(
        &self,
        bundle: AppBundle,
        store: &mut dyn EntryStore,
    ) -> Result<(AppBundle, Vec<MergeReport>)> {
        let mut modules = Vec::with_capacity(bundle.modules.len());
        let mut reports = Vec::new();
        for module in bundle.modules {
            let (module, report) = self.merge_module(module, store)?;
            if let Some(report) = report {
                reports.push(report);
            }
            modules.push(module);
        }

        let count: usize = reports.iter().map(MergeReport::removed_count).sum();
        let size: u64 = reports.iter().map(MergeReport::removed_size).sum();
        info!(
            removed = count,
            size = %format_size(size),
            "removed duplicate resources"
        );
        Ok((
            AppBundle {
                modules,
                metadata: bundle.metadata,
                root_entries: bundle.root_entries,
            },
            reports,
        ))
    }

    fn merge_module(
        &self,
        module: BundleModule,
        store: &mut dyn EntryStore,
    ) -> Result<(BundleModule, Option<MergeReport>)> {
        let has_packages = module.table.as_ref().map_or(false, |t| !t.is_empty());
        if !has_packages || module.entries.is_empty() {
            return Ok((module, None));
        }

        let mut kept_by_hash: HashMap<String, String> = HashMap::new();
        let mut redirects: HashMap<String, String> = HashMap::new();
        let mut report = MergeReport {
            module: module.name.clone(),
            duplicates: Vec::new(),
        };
        let mut entries = Vec::with_capacity(module.entries.len());
        for entry in module.entries {
            if !entry.is_resource() {
                entries.push(entry);
                continue;
            }
            let md5 = store.md5(&entry.content)?;
            match kept_by_hash.get(&md5) {
                Some(kept) => {
                    let size = store.size(&entry.content)?;
                    debug!(
                        module = %module.name,
                        discarded = %entry.path,
                        kept = %kept,
                        size,
                        "found duplicate resource"
                    );
                    report.duplicates.push(DuplicateRecord {
                        discarded: entry.path.clone(),
                        kept: kept.clone(),
                        size,
                    });
                    redirects.insert(entry.path, kept.clone());
                }
                None => {
                    kept_by_hash.insert(md5, entry.path.clone());
                    entries.push(entry);
                }
            }
        }

        let table = match module.table {
            Some(table) if !redirects.is_empty() => Some(table.rebuild(|e| {
                let config_values = e
                    .entry
                    .config_values
                    .iter()
                    .map(|cv| match cv.file_path().and_then(|p| redirects.get(p)) {
                        Some(kept) => cv.with_file_path(kept),
                        None => cv.clone(),
                    })
                    .collect();
                Ok(Entry {
                    id: e.entry.id,
                    name: e.entry.name.clone(),
                    config_values,
                })
            })?),
            other => other,
        };

        Ok((
            BundleModule {
                name: module.name,
                table,
                entries,
            },
            Some(report),
        ))
    }
}
