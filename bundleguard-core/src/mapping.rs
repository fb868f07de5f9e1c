//! Raw to obfuscated name ledger
//!
//! Holds the three renaming maps (directories, resource full names and
//! module-qualified file paths) plus the resource ids used to annotate the
//! text ledger. Only resource renames are guarded against collisions here;
//! the rewriter keeps directory and path names unique through its scoped
//! name pools.

use crate::table::ResourceId;
use crate::zip_path::RESOURCES_DIRECTORY;
use crate::{GuardError, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

pub(crate) const DIR_SECTION: &str = "res dir mapping:";
pub(crate) const RESOURCE_SECTION: &str = "res id mapping:";
pub(crate) const ENTRY_SECTION: &str = "res entries path mapping:";

/// Placeholder for names whose resource id was never recorded.
pub const UNKNOWN_ID: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceMapping {
    dir_mapping: BTreeMap<String, String>,
    resource_mapping: BTreeMap<String, String>,
    resource_targets: HashMap<String, String>,
    entry_files_mapping: BTreeMap<String, String>,
    resource_name_to_id: HashMap<String, ResourceId>,
    resource_path_to_id: HashMap<String, ResourceId>,
}

impl ResourceMapping {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no rename of any kind is recorded.
    pub fn is_empty(&self) -> bool {
        self.dir_mapping.is_empty()
            && self.resource_mapping.is_empty()
            && self.entry_files_mapping.is_empty()
    }

    // Directories

    /// Records that directory `raw` becomes `obfuscated`.
    pub fn put_dir_mapping(&mut self, raw: impl Into<String>, obfuscated: impl Into<String>) {
        self.dir_mapping.insert(raw.into(), obfuscated.into());
    }

    /// Obfuscated name of directory `raw`.
    pub fn dir(&self, raw: &str) -> Option<&str> {
        self.dir_mapping.get(raw).map(String::as_str)
    }

    /// All directory renames, sorted by raw path.
    pub fn dir_mapping(&self) -> &BTreeMap<String, String> {
        &self.dir_mapping
    }

    /// Every directory target must live under `res/`.
    pub fn check_dir_rules(&self) -> Result<()> {
        for (raw, obfuscated) in &self.dir_mapping {
            let under_res = obfuscated
                .strip_prefix(RESOURCES_DIRECTORY)
                .map_or(false, |rest| rest.starts_with('/'));
            if !under_res {
                return Err(GuardError::Configuration(format!(
                    "directory mapping {} -> {} must map into {}/",
                    raw, obfuscated, RESOURCES_DIRECTORY
                )));
            }
        }
        Ok(())
    }

    // Resources

    /// Records `raw -> obfuscated`, failing if another resource already
    /// claimed `obfuscated`.
    pub fn put_resource_mapping(
        &mut self,
        raw: impl Into<String>,
        obfuscated: impl Into<String>,
    ) -> Result<()> {
        let raw = raw.into();
        let obfuscated = obfuscated.into();
        if let Some(existing) = self.resource_targets.get(&obfuscated) {
            if *existing != raw {
                return Err(GuardError::DuplicateTargetName {
                    raw,
                    target: obfuscated,
                    existing: existing.clone(),
                });
            }
            return Ok(());
        }
        if let Some(previous) = self.resource_mapping.insert(raw.clone(), obfuscated.clone()) {
            self.resource_targets.remove(&previous);
        }
        self.resource_targets.insert(obfuscated, raw);
        Ok(())
    }

    /// Forgets the rename of `raw`, returning its obfuscated name.
    pub fn remove_resource_mapping(&mut self, raw: &str) -> Option<String> {
        let obfuscated = self.resource_mapping.remove(raw)?;
        self.resource_targets.remove(&obfuscated);
        Some(obfuscated)
    }

    /// Obfuscated full name of resource `raw`.
    pub fn resource(&self, raw: &str) -> Option<&str> {
        self.resource_mapping.get(raw).map(String::as_str)
    }

    /// All resource renames, sorted by raw name.
    pub fn resource_mapping(&self) -> &BTreeMap<String, String> {
        &self.resource_mapping
    }

    // Entry files

    /// Records the new path of a module-qualified file.
    pub fn put_entry_file_mapping(&mut self, raw: impl Into<String>, obfuscated: impl Into<String>) {
        self.entry_files_mapping.insert(raw.into(), obfuscated.into());
    }

    /// Forgets the new path of `raw`.
    pub fn remove_entry_file_mapping(&mut self, raw: &str) -> Option<String> {
        self.entry_files_mapping.remove(raw)
    }

    /// New path of module-qualified file `raw`.
    pub fn entry_file(&self, raw: &str) -> Option<&str> {
        self.entry_files_mapping.get(raw).map(String::as_str)
    }

    /// All file moves, sorted by raw path.
    pub fn entry_files_mapping(&self) -> &BTreeMap<String, String> {
        &self.entry_files_mapping
    }

    // Diagnostics

    /// Remembers the id of resource `name` for the ledger.
    pub fn put_resource_id(&mut self, name: impl Into<String>, id: ResourceId) {
        self.resource_name_to_id.insert(name.into(), id);
    }

    /// Remembers the id of the resource owning file `path`.
    pub fn put_resource_path_id(&mut self, path: impl Into<String>, id: ResourceId) {
        self.resource_path_to_id.insert(path.into(), id);
    }

    /// Recorded id of resource `name`.
    pub fn resource_id(&self, name: &str) -> Option<ResourceId> {
        self.resource_name_to_id.get(name).copied()
    }

    /// Recorded id of the resource owning `path`.
    pub fn resource_path_id(&self, path: &str) -> Option<ResourceId> {
        self.resource_path_to_id.get(path).copied()
    }

    /// Writes the text ledger. Sections are sorted by raw name.
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<()> {
        writeln!(out, "{}", DIR_SECTION)?;
        for (raw, obfuscated) in &self.dir_mapping {
            writeln!(out, "\t{} -> {}", raw, obfuscated)?;
        }
        write!(out, "\n\n")?;

        writeln!(out, "{}", RESOURCE_SECTION)?;
        for (raw, obfuscated) in &self.resource_mapping {
            let id = render_id(self.resource_id(raw));
            writeln!(out, "\t{} : {} -> {}", id, raw, obfuscated)?;
        }
        write!(out, "\n\n")?;

        writeln!(out, "{}", ENTRY_SECTION)?;
        for (raw, obfuscated) in &self.entry_files_mapping {
            let id = render_id(self.resource_path_id(raw));
            writeln!(out, "\t{} : {} -> {}", id, raw, obfuscated)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Writes the ledger into a temporary file in `dir`. The caller moves
    /// it into place once the run's output is published.
    pub fn stage_in(&self, dir: &Path) -> Result<NamedTempFile> {
        fs::create_dir_all(dir)?;
        let mut temp = NamedTempFile::new_in(dir)?;
        self.write_to(BufWriter::new(temp.as_file_mut()))?;
        debug!(
            dir = %dir.display(),
            dirs = self.dir_mapping.len(),
            resources = self.resource_mapping.len(),
            files = self.entry_files_mapping.len(),
            "staged mapping"
        );
        Ok(temp)
    }
}

fn render_id(id: Option<ResourceId>) -> String {
    match id {
        Some(id) => id.to_string(),
        None => UNKNOWN_ID.to_string(),
    }
}
