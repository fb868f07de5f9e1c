//! Resource obfuscation over a whole bundle

use crate::bundle::{AppBundle, BundleModule};
use crate::entries::relocate_entries;
use crate::mapping::ResourceMapping;
use crate::name_generator::NameBlacklist;
use crate::rewriter::{NameScopes, TableRewriter};
use crate::whitelist::WhitelistMatcher;
use crate::Result;
use tracing::{debug, info};

/// Renames directories, resource entries and resource files of every module,
/// continuing from a prior mapping.
pub struct ResourcesObfuscator<'a> {
    whitelist: &'a WhitelistMatcher,
    blacklist: &'a NameBlacklist,
    mapping: ResourceMapping,
}

impl<'a> ResourcesObfuscator<'a> {
    /// Continues from `prior`, which is empty on a first run.
    pub fn new(
        whitelist: &'a WhitelistMatcher,
        blacklist: &'a NameBlacklist,
        prior: ResourceMapping,
    ) -> Self {
        Self {
            whitelist,
            blacklist,
            mapping: prior,
        }
    }

    /// The ledger so far.
    pub fn mapping(&self) -> &ResourceMapping {
        &self.mapping
    }

    /// Consumes the obfuscator, returning its ledger.
    pub fn into_mapping(self) -> ResourceMapping {
        self.mapping
    }

    /// Renames directories, resources and files of every module.
    pub fn obfuscate(&mut self, bundle: AppBundle) -> Result<AppBundle> {
        self.mapping.check_dir_rules()?;
        let mut scopes = NameScopes::seeded(&self.mapping, self.blacklist.clone())?;

        let mut modules = Vec::with_capacity(bundle.modules.len());
        for module in bundle.modules {
            modules.push(self.obfuscate_module(module, &mut scopes)?);
        }

        info!(
            dirs = self.mapping.dir_mapping().len(),
            resources = self.mapping.resource_mapping().len(),
            files = self.mapping.entry_files_mapping().len(),
            "obfuscated resources"
        );
        Ok(AppBundle {
            modules,
            metadata: bundle.metadata,
            root_entries: bundle.root_entries,
        })
    }

    fn obfuscate_module(
        &mut self,
        mut module: BundleModule,
        scopes: &mut NameScopes,
    ) -> Result<BundleModule> {
        let table = match module.table.take() {
            Some(table) if !table.is_empty() => table,
            other => {
                debug!(module = %module.name, "no resource table, skipping");
                module.table = other;
                return Ok(module);
            }
        };

        let (table, rewrites) = {
            let mut rewriter =
                TableRewriter::new(&module.name, &mut self.mapping, scopes, self.whitelist);
            let dirs = rewriter.map_directories(&table)?;
            rewriter.map_resources(&table)?;
            let rewrites = rewriter.map_entry_files(&module)?;
            let rebuilt = rewriter.rebuild_table(&table, &rewrites)?;
            debug!(module = %module.name, new_dirs = dirs, files = rewrites.len(), "rewrote table");
            (rebuilt, rewrites)
        };
        let entries = relocate_entries(&module, &rewrites)?;

        Ok(BundleModule {
            name: module.name,
            table: Some(table),
            entries,
        })
    }
}
