//! Moving physical resource files to their obfuscated paths

use crate::bundle::{BundleModule, ModuleEntry};
use crate::{GuardError, Result};
use std::collections::{BTreeMap, HashMap};

/// Planned moves for one module: module-qualified raw path to the new
/// module-relative path. No two raw paths may claim the same target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathRewrites {
    targets: BTreeMap<String, String>,
    claimed: HashMap<String, String>,
}

impl PathRewrites {
    /// Plans a move of `raw` to `target`, failing if another path already claims `target`.
    pub fn insert(&mut self, raw: impl Into<String>, target: impl Into<String>) -> Result<()> {
        let raw = raw.into();
        let target = target.into();
        if let Some(existing) = self.claimed.get(&target) {
            if *existing != raw {
                return Err(GuardError::DuplicatePath {
                    raw,
                    target,
                    existing: existing.clone(),
                });
            }
        }
        if let Some(previous) = self.targets.insert(raw.clone(), target.clone()) {
            self.claimed.remove(&previous);
        }
        self.claimed.insert(target, raw);
        Ok(())
    }

    /// Planned target of `raw`, if it moves.
    pub fn get(&self, raw: &str) -> Option<&str> {
        self.targets.get(raw).map(String::as_str)
    }

    /// Number of planned moves.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// True when nothing moves.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Applies `rewrites` to the module's entries, keeping order and content.
///
/// Fails if two output entries would share a path, which covers a renamed
/// file landing on one that stayed in place.
pub fn relocate_entries(module: &BundleModule, rewrites: &PathRewrites) -> Result<Vec<ModuleEntry>> {
    let mut relocated = Vec::with_capacity(module.entries.len());
    let mut seen: HashMap<String, String> = HashMap::with_capacity(module.entries.len());
    for entry in &module.entries {
        let raw = module.qualified_path(&entry.path);
        let moved = match rewrites.get(&raw) {
            Some(target) => entry.relocated(target),
            None => entry.clone(),
        };
        if let Some(existing) = seen.insert(moved.path.clone(), raw.clone()) {
            return Err(GuardError::DuplicatePath {
                raw,
                target: module.qualified_path(&moved.path),
                existing,
            });
        }
        relocated.push(moved);
    }
    Ok(relocated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(paths: &[&str]) -> BundleModule {
        BundleModule {
            name: "base".into(),
            table: None,
            entries: paths
                .iter()
                .map(|p| ModuleEntry::archived(*p, format!("base/{}", p)))
                .collect(),
        }
    }

    #[test]
    fn test_relocates_and_keeps_content() {
        let module = module(&["manifest/AndroidManifest.xml", "res/drawable/icon.png"]);
        let mut rewrites = PathRewrites::default();
        rewrites.insert("base/res/drawable/icon.png", "res/a/a.png").unwrap();
        let entries = relocate_entries(&module, &rewrites).unwrap();
        assert_eq!(entries[0], module.entries[0]);
        assert_eq!(entries[1].path, "res/a/a.png");
        assert_eq!(entries[1].content, module.entries[1].content);
    }

    #[test]
    fn test_duplicate_targets_are_rejected() {
        let mut rewrites = PathRewrites::default();
        rewrites.insert("base/res/drawable/a.png", "res/a/a.png").unwrap();
        rewrites.insert("base/res/drawable/a.png", "res/a/a.png").unwrap();
        let err = rewrites.insert("base/res/drawable/b.png", "res/a/a.png").unwrap_err();
        assert!(matches!(err, GuardError::DuplicatePath { .. }));
    }

    #[test]
    fn test_renamed_file_cannot_shadow_kept_file() {
        let module = module(&["res/a/a.png", "res/drawable/icon.png"]);
        let mut rewrites = PathRewrites::default();
        rewrites.insert("base/res/drawable/icon.png", "res/a/a.png").unwrap();
        let err = relocate_entries(&module, &rewrites).unwrap_err();
        assert!(matches!(
            err,
            GuardError::DuplicatePath { ref existing, .. } if existing == "base/res/a/a.png"
        ));
    }
}
