//! Stripping files from the bundle by rule

use crate::bundle::{AppBundle, BundleModule, EntryStore, ModuleEntry};
use crate::report::format_size;
use crate::whitelist::WhitelistMatcher;
use crate::zip_path::{self, LIB_DIRECTORY, METADATA_DIRECTORY};
use crate::{GuardError, Result};
use tracing::{debug, info};

/// Signature files of a previously signed archive, always removed.
pub const SIGNATURE_RULES: [&str; 3] = ["META-INF/*.RSA", "META-INF/*.SF", "META-INF/*.MF"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFilterReport {
    /// Removed entries, by archive path.
    pub removed: Vec<String>,
    pub removed_size: u64,
}

impl FileFilterReport {
    /// Number of entries dropped.
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

pub struct BundleFileFilter {
    rules: WhitelistMatcher,
}

impl BundleFileFilter {
    /// Compiles `rules` together with the signature file rules.
    pub fn new<S: AsRef<str>>(rules: &[S]) -> Result<Self> {
        let mut all: Vec<String> = rules.iter().map(|r| r.as_ref().to_string()).collect();
        for rule in SIGNATURE_RULES {
            if !all.iter().any(|r| r == rule) {
                all.push(rule.to_string());
            }
        }
        Ok(Self {
            rules: WhitelistMatcher::new(&all)?,
        })
    }

    /// The configured rules followed by the signature file rules.
    pub fn rules(&self) -> &[String] {
        self.rules.rules()
    }

    /// Drops every matching entry and reports what was removed.
    pub fn filter(
        &self,
        bundle: AppBundle,
        store: &mut dyn EntryStore,
    ) -> Result<(AppBundle, FileFilterReport)> {
        let mut report = FileFilterReport::default();

        let mut modules = Vec::with_capacity(bundle.modules.len());
        for module in bundle.modules {
            modules.push(self.filter_module(module, store, &mut report)?);
        }

        let metadata = self.retain(bundle.metadata, store, &mut report, |entry| {
            zip_path::join(METADATA_DIRECTORY, &entry.path)
        })?;
        let root_entries =
            self.retain(bundle.root_entries, store, &mut report, |entry| entry.path.clone())?;

        info!(
            removed = report.removed_count(),
            size = %format_size(report.removed_size),
            "filtered files"
        );
        Ok((
            AppBundle {
                modules,
                metadata,
                root_entries,
            },
            report,
        ))
    }

    fn filter_module(
        &self,
        module: BundleModule,
        store: &mut dyn EntryStore,
        report: &mut FileFilterReport,
    ) -> Result<BundleModule> {
        let mut entries = Vec::with_capacity(module.entries.len());
        for entry in module.entries {
            let rule = match self.rules.matched_rule(&entry.path) {
                Some(rule) => rule,
                None => {
                    entries.push(entry);
                    continue;
                }
            };
            if !zip_path::starts_with(&entry.path, LIB_DIRECTORY)
                && !zip_path::starts_with(&entry.path, METADATA_DIRECTORY)
            {
                return Err(GuardError::Configuration(format!(
                    "{}/{} matched file filter rule `{}`, only files under {}/ or {}/ can be filtered",
                    module.name, entry.path, rule, LIB_DIRECTORY, METADATA_DIRECTORY
                )));
            }
            let size = store.size(&entry.content)?;
            let path = zip_path::join(&module.name, &entry.path);
            debug!(path = %path, rule, "filtered file");
            report.removed.push(path);
            report.removed_size += size;
        }
        Ok(BundleModule {
            name: module.name,
            table: module.table,
            entries,
        })
    }

    fn retain<F>(
        &self,
        entries: Vec<ModuleEntry>,
        store: &mut dyn EntryStore,
        report: &mut FileFilterReport,
        archive_path: F,
    ) -> Result<Vec<ModuleEntry>>
    where
        F: Fn(&ModuleEntry) -> String,
    {
        let mut kept = Vec::with_capacity(entries.len());
        for entry in entries {
            let path = archive_path(&entry);
            match self.rules.matched_rule(&path) {
                Some(rule) => {
                    debug!(path = %path, rule, "filtered file");
                    report.removed_size += store.size(&entry.content)?;
                    report.removed.push(path);
                }
                None => kept.push(entry),
            }
        }
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::tests::MemoryStore;

    fn bundle() -> (AppBundle, MemoryStore) {
        let store = MemoryStore::default()
            .with("base/lib/arm64-v8a/libfoo.so", &[0u8; 100])
            .with("base/lib/x86/libfoo.so", &[0u8; 50])
            .with("base/res/raw/a.bin", b"a")
            .with("BUNDLE-METADATA/com.android.tools.build.obfuscation/proguard.map", &[1u8; 30])
            .with("META-INF/CERT.RSA", &[2u8; 7])
            .with("META-INF/CERT.SF", &[2u8; 3])
            .with("BundleConfig.pb", b"cfg");
        let bundle = AppBundle {
            modules: vec![BundleModule {
                name: "base".into(),
                table: None,
                entries: vec![
                    ModuleEntry::archived("lib/arm64-v8a/libfoo.so", "base/lib/arm64-v8a/libfoo.so"),
                    ModuleEntry::archived("lib/x86/libfoo.so", "base/lib/x86/libfoo.so"),
                    ModuleEntry::archived("res/raw/a.bin", "base/res/raw/a.bin"),
                ],
            }],
            metadata: vec![ModuleEntry::archived(
                "com.android.tools.build.obfuscation/proguard.map",
                "BUNDLE-METADATA/com.android.tools.build.obfuscation/proguard.map",
            )],
            root_entries: vec![
                ModuleEntry::archived("BundleConfig.pb", "BundleConfig.pb"),
                ModuleEntry::archived("META-INF/CERT.RSA", "META-INF/CERT.RSA"),
                ModuleEntry::archived("META-INF/CERT.SF", "META-INF/CERT.SF"),
            ],
        };
        (bundle, store)
    }

    #[test]
    fn test_removes_matching_entries_and_signatures() {
        let (bundle, mut store) = bundle();
        let filter = BundleFileFilter::new(&["lib/x86/*", "BUNDLE-METADATA/*.map"]).unwrap();
        let (filtered, report) = filter.filter(bundle, &mut store).unwrap();

        let paths: Vec<_> = filtered.modules[0].entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["lib/arm64-v8a/libfoo.so", "res/raw/a.bin"]);
        assert!(filtered.metadata.is_empty());
        assert_eq!(filtered.root_entries.len(), 1);
        assert_eq!(
            report.removed,
            vec![
                "base/lib/x86/libfoo.so",
                "BUNDLE-METADATA/com.android.tools.build.obfuscation/proguard.map",
                "META-INF/CERT.RSA",
                "META-INF/CERT.SF",
            ]
        );
        assert_eq!(report.removed_size, 50 + 30 + 7 + 3);
    }

    #[test]
    fn test_refuses_to_filter_resources() {
        let (bundle, mut store) = bundle();
        let filter = BundleFileFilter::new(&["res/raw/*"]).unwrap();
        let err = filter.filter(bundle, &mut store).unwrap_err();
        match err {
            GuardError::Configuration(msg) => {
                assert!(msg.contains("base/res/raw/a.bin"));
                assert!(msg.contains("res/raw/*"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_signature_rules_are_always_present() {
        let filter = BundleFileFilter::new::<&str>(&[]).unwrap();
        assert_eq!(filter.rules().len(), 3);
        let filter = BundleFileFilter::new(&["META-INF/*.MF"]).unwrap();
        assert_eq!(filter.rules().len(), 3);
    }
}
