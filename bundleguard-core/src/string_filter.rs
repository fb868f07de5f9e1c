//! Trimming string resources by locale and by usage

use crate::bundle::{AppBundle, BundleModule};
use crate::table::{ConfigValue, Entry, Value, APP_PACKAGE_ID};
use crate::Result;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Placeholder written over the values of unused strings.
pub const REMOVED_VALUE: &str = "[value removed]";

const STRING_TYPE: &str = "string";

/// Reads one resource name per line. A missing file yields no names.
pub fn read_unused_names(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() {
        warn!(path = %path.display(), "unused strings file does not exist");
        return Ok(HashSet::new());
    }
    let text = fs::read_to_string(path)?;
    let names: HashSet<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    info!(path = %path.display(), count = names.len(), "loaded unused strings");
    Ok(names)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringFilterReport {
    pub removed_locales: BTreeSet<String>,
    pub cleared_names: BTreeSet<String>,
}

pub struct BundleStringFilter {
    unused_names: HashSet<String>,
    locale_whitelist: HashSet<String>,
}

impl BundleStringFilter {
    /// Filter dropping `unused_names` and any locale outside `locale_whitelist`.
    pub fn new(unused_names: HashSet<String>, locale_whitelist: HashSet<String>) -> Self {
        Self {
            unused_names,
            locale_whitelist,
        }
    }

    /// A value is kept when it has no locale or its language is listed.
    pub fn keep_locale(&self, locale: &str) -> bool {
        if locale.trim().is_empty() {
            return true;
        }
        let language = locale.split('-').next().unwrap_or(locale);
        self.locale_whitelist.contains(language)
    }

    /// Strips filtered string values from every table.
    pub fn filter(&self, bundle: AppBundle) -> Result<(AppBundle, StringFilterReport)> {
        let mut report = StringFilterReport::default();
        if self.unused_names.is_empty() && self.locale_whitelist.is_empty() {
            debug!("no unused strings or locale whitelist, skipping string filter");
            return Ok((bundle, report));
        }

        let mut modules = Vec::with_capacity(bundle.modules.len());
        for module in bundle.modules {
            modules.push(self.filter_module(module, &mut report)?);
        }
        for locale in &report.removed_locales {
            info!(locale = %locale, "removed language");
        }
        info!(
            locales = report.removed_locales.len(),
            names = report.cleared_names.len(),
            "filtered strings"
        );
        Ok((
            AppBundle {
                modules,
                metadata: bundle.metadata,
                root_entries: bundle.root_entries,
            },
            report,
        ))
    }

    fn filter_module(
        &self,
        module: BundleModule,
        report: &mut StringFilterReport,
    ) -> Result<BundleModule> {
        let table = match &module.table {
            Some(table) => table,
            None => return Ok(module),
        };
        let table = table.rebuild(|e| {
            if e.package.id != APP_PACKAGE_ID || e.res_type.name != STRING_TYPE {
                return Ok(e.entry.clone());
            }
            let mut config_values: Vec<ConfigValue> = e.entry.config_values.clone();
            if !self.locale_whitelist.is_empty() {
                config_values.retain(|cv| {
                    let keep = self.keep_locale(&cv.config.locale);
                    if !keep {
                        report.removed_locales.insert(cv.config.locale.clone());
                    }
                    keep
                });
            }
            if self.unused_names.contains(&e.entry.name) {
                debug!(name = %e.entry.name, "clearing unused string");
                report.cleared_names.insert(e.entry.name.clone());
                config_values = config_values
                    .into_iter()
                    .map(|cv| ConfigValue {
                        config: cv.config,
                        value: Value::Str {
                            value: REMOVED_VALUE.to_string(),
                        },
                    })
                    .collect();
            }
            Ok(Entry {
                id: e.entry.id,
                name: e.entry.name.clone(),
                config_values,
            })
        })?;
        Ok(BundleModule {
            table: Some(table),
            ..module
        })
    }
}
