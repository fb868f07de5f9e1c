//! Reading a ledger written by [`ResourceMapping::write_to`]

use crate::mapping::ResourceMapping;
use crate::{GuardError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::info;

static MAP_DIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s+(.*)->(.*)").unwrap());
static MAP_RES: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s+(.*):(.*)->(.*)").unwrap());

/// Reads and parses a ledger written by a previous run.
pub fn read_mapping_file(path: &Path) -> Result<ResourceMapping> {
    let text = fs::read_to_string(path)?;
    let mapping = parse_mapping(&text)?;
    info!(
        path = %path.display(),
        dirs = mapping.dir_mapping().len(),
        resources = mapping.resource_mapping().len(),
        files = mapping.entry_files_mapping().len(),
        "loaded mapping"
    );
    Ok(mapping)
}

/// Parses ledger text. Headers and blank lines are skipped; every indented
/// line must be a directory, resource or entry-path mapping.
pub fn parse_mapping(text: &str) -> Result<ResourceMapping> {
    let mut mapping = ResourceMapping::new();
    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() || !line.starts_with(char::is_whitespace) {
            continue;
        }
        let malformed = |reason: String| GuardError::MalformedMapping {
            line: line_no,
            reason,
        };

        if !line.contains(':') {
            let caps = MAP_DIR
                .captures(line)
                .ok_or_else(|| malformed(format!("expected `raw -> obfuscated`, found `{}`", line.trim())))?;
            let raw = caps[1].trim();
            let obfuscated = caps[2].trim();
            if !raw.contains('/') || raw.contains('.') {
                return Err(malformed(format!("invalid directory `{}`", raw)));
            }
            if obfuscated.is_empty() {
                return Err(malformed(format!("missing target for `{}`", raw)));
            }
            mapping.put_dir_mapping(raw, obfuscated);
            continue;
        }

        let caps = MAP_RES
            .captures(line)
            .ok_or_else(|| malformed(format!("expected `id : raw -> obfuscated`, found `{}`", line.trim())))?;
        let raw = caps[2].trim();
        let obfuscated = caps[3].trim();
        if raw.is_empty() || obfuscated.is_empty() {
            return Err(malformed("empty name".to_string()));
        }
        if raw.contains('/') {
            mapping.put_entry_file_mapping(raw, obfuscated);
        } else if raw.contains(".R.") {
            mapping
                .put_resource_mapping(raw, obfuscated)
                .map_err(|err| malformed(err.to_string()))?;
        } else {
            return Err(malformed(format!(
                "invalid resource name `{}`, it should be package.R.type.entry",
                raw
            )));
        }
    }
    Ok(mapping)
}
