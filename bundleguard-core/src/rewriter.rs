//! Resource table rewriting
//!
//! Decides, for every directory, resource entry and resource file of a
//! module, whether it keeps its raw name, reuses a name from the incoming
//! mapping or receives a freshly minted one. Names are minted from
//! [`NameScopes`], one pool per namespace, so uniqueness only has to hold
//! where a clash would actually be observable.

use crate::bundle::BundleModule;
use crate::entries::PathRewrites;
use crate::mapping::ResourceMapping;
use crate::name_generator::{NameBlacklist, NameGenerator};
use crate::table::{self, Entry, ResourceTable};
use crate::whitelist::WhitelistMatcher;
use crate::zip_path::{self, RESOURCES_DIRECTORY};
use crate::{GuardError, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info};

/// Namespace in which minted names must be unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameScope {
    /// Directory names directly under `res/`, shared by all modules.
    ResourcesRoot,
    /// Entry names of one type, keyed by `package.R.type`.
    Type(String),
    /// File names inside one obfuscated directory of one module.
    Directory { module: String, dir: String },
}

impl fmt::Display for NameScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameScope::ResourcesRoot => write!(f, "{}/", RESOURCES_DIRECTORY),
            NameScope::Type(prefix) => write!(f, "{}", prefix),
            NameScope::Directory { module, dir } => write!(f, "{}/{}", module, dir),
        }
    }
}

#[derive(Debug)]
struct ScopedPool {
    generator: NameGenerator,
    in_use: HashSet<String>,
    filled: bool,
}

impl ScopedPool {
    fn new(scope: &NameScope) -> Self {
        Self {
            generator: NameGenerator::new(scope.to_string()),
            in_use: HashSet::new(),
            filled: false,
        }
    }
}

/// Name pools per [`NameScope`], created lazily.
#[derive(Debug)]
pub struct NameScopes {
    blacklist: NameBlacklist,
    pools: HashMap<NameScope, ScopedPool>,
}

impl NameScopes {
    /// Empty pools filtered by `blacklist`.
    pub fn new(blacklist: NameBlacklist) -> Self {
        Self {
            blacklist,
            pools: HashMap::new(),
        }
    }

    /// Reserves every obfuscated name already present in `mapping`.
    pub fn seeded(mapping: &ResourceMapping, blacklist: NameBlacklist) -> Result<Self> {
        let mut scopes = Self::new(blacklist);
        for obfuscated in mapping.dir_mapping().values() {
            scopes.reserve(NameScope::ResourcesRoot, zip_path::file_name(obfuscated));
        }
        for obfuscated in mapping.resource_mapping().values() {
            let (prefix, name) = obfuscated.rsplit_once('.').ok_or_else(|| {
                GuardError::Configuration(format!("invalid obfuscated resource name `{}`", obfuscated))
            })?;
            scopes.reserve(NameScope::Type(prefix.to_string()), name);
        }
        for (raw, obfuscated) in mapping.entry_files_mapping() {
            let module = raw.split('/').next().unwrap_or_default();
            let dir = zip_path::parent(obfuscated).unwrap_or_default();
            scopes.reserve(
                NameScope::Directory {
                    module: module.to_string(),
                    dir: dir.to_string(),
                },
                zip_path::file_prefix(obfuscated),
            );
        }
        Ok(scopes)
    }

    fn pool(&mut self, scope: &NameScope) -> &mut ScopedPool {
        self.pools
            .entry(scope.clone())
            .or_insert_with(|| ScopedPool::new(scope))
    }

    /// Marks `name` as taken in `scope`.
    pub fn reserve(&mut self, scope: NameScope, name: impl Into<String>) {
        self.pool(&scope).in_use.insert(name.into());
    }

    /// Whether `name` is taken in `scope`.
    pub fn is_reserved(&self, scope: &NameScope, name: &str) -> bool {
        self.pools
            .get(scope)
            .map_or(false, |pool| pool.in_use.contains(name))
    }

    /// Next free name of `scope`.
    pub fn mint(&mut self, scope: &NameScope) -> Result<String> {
        let pool = self
            .pools
            .entry(scope.clone())
            .or_insert_with(|| ScopedPool::new(scope));
        if !pool.filled {
            pool.generator.reset(&self.blacklist);
            pool.generator.remove_strings(pool.in_use.iter());
            pool.filled = true;
        }
        let name = pool.generator.get_replace_string(&pool.in_use)?;
        pool.in_use.insert(name.clone());
        Ok(name)
    }
}

fn type_scope(package: &str, type_name: &str) -> NameScope {
    NameScope::Type(format!("{}.R.{}", package, type_name))
}

/// Rewrites one module against the shared mapping and name pools.
pub struct TableRewriter<'a> {
    module: &'a str,
    mapping: &'a mut ResourceMapping,
    scopes: &'a mut NameScopes,
    whitelist: &'a WhitelistMatcher,
}

impl<'a> TableRewriter<'a> {
    pub fn new(
        module: &'a str,
        mapping: &'a mut ResourceMapping,
        scopes: &'a mut NameScopes,
        whitelist: &'a WhitelistMatcher,
    ) -> Self {
        Self {
            module,
            mapping,
            scopes,
            whitelist,
        }
    }

    /// Mints a directory for every unmapped parent of a referenced file.
    /// Returns how many were added.
    pub fn map_directories(&mut self, table: &ResourceTable) -> Result<usize> {
        let mut added = 0;
        let parents: Vec<String> = table
            .file_references()
            .filter_map(zip_path::parent)
            .map(str::to_string)
            .collect();
        for parent in parents {
            if self.mapping.dir(&parent).is_some() {
                continue;
            }
            let name = self.scopes.mint(&NameScope::ResourcesRoot)?;
            let obfuscated = zip_path::join(RESOURCES_DIRECTORY, &name);
            debug!(module = self.module, raw = %parent, obfuscated = %obfuscated, "mapped directory");
            self.mapping.put_dir_mapping(parent, obfuscated);
            added += 1;
        }
        Ok(added)
    }

    /// Maps every entry in table order: whitelisted entries drop any prior
    /// mapping, mapped entries keep theirs, the rest get a new name.
    pub fn map_resources(&mut self, table: &ResourceTable) -> Result<()> {
        // Whitelisted entries keep their raw names, so nothing may be minted
        // or carried over onto them.
        let mut kept_raw: HashSet<(NameScope, String)> = HashSet::new();
        for e in table.entries() {
            if self.whitelist.should_exempt(&e.full_name()) {
                let scope = type_scope(&e.package.name, &e.res_type.name);
                self.scopes.reserve(scope.clone(), e.entry.name.clone());
                kept_raw.insert((scope, e.entry.name.clone()));
            }
        }

        for e in table.entries() {
            let raw = e.full_name();
            let scope = type_scope(&e.package.name, &e.res_type.name);
            if self.whitelist.should_exempt(&raw) {
                match self.mapping.remove_resource_mapping(&raw) {
                    Some(previous) => info!(
                        module = self.module,
                        resource = %raw,
                        id = %e.resource_id(),
                        previous = %previous,
                        "removing whitelisted resource from mapping"
                    ),
                    None => debug!(module = self.module, resource = %raw, id = %e.resource_id(), "whitelisted resource"),
                }
                continue;
            }
            if let Some(obfuscated) = self.mapping.resource(&raw) {
                let stale = table::entry_name_of(obfuscated)?.to_string();
                if !kept_raw.contains(&(scope.clone(), stale.clone())) {
                    self.scopes.reserve(scope, stale);
                    continue;
                }
                self.mapping.remove_resource_mapping(&raw);
                let name = self.scopes.mint(&scope)?;
                info!(
                    module = self.module,
                    resource = %raw,
                    stale = %stale,
                    renamed = %name,
                    "prior name now belongs to a whitelisted resource"
                );
                let obfuscated = table::full_name(&e.package.name, &e.res_type.name, &name);
                self.mapping.put_resource_mapping(raw, obfuscated)?;
                continue;
            }
            let name = self.scopes.mint(&scope)?;
            let obfuscated =
                table::full_name(&e.package.name, &e.res_type.name, &name);
            self.mapping.put_resource_mapping(raw, obfuscated)?;
        }
        Ok(())
    }

    /// Computes the new path of every resource file of the module.
    ///
    /// Files keep their suffix and move into their directory's obfuscated
    /// counterpart. Whitelisted files stay where they are.
    pub fn map_entry_files(&mut self, module: &BundleModule) -> Result<PathRewrites> {
        let mut rewrites = PathRewrites::default();
        for entry in module.resource_entries() {
            let raw_key = module.qualified_path(&entry.path);
            let raw_dir = zip_path::parent(&entry.path).unwrap_or_default();
            let obfuscated_dir = self
                .mapping
                .dir(raw_dir)
                .ok_or_else(|| {
                    GuardError::Integrity(format!(
                        "can not find resource directory `{}` for {}",
                        raw_dir, raw_key
                    ))
                })?
                .to_string();

            if self.whitelist.should_exempt(&raw_key) {
                match self.mapping.remove_entry_file_mapping(&raw_key) {
                    Some(previous) => info!(
                        path = %raw_key,
                        previous = %previous,
                        "removing whitelisted file from mapping"
                    ),
                    None => debug!(path = %raw_key, "whitelisted file"),
                }
                continue;
            }

            let target = match self.mapping.entry_file(&raw_key) {
                Some(target) => target.to_string(),
                None => {
                    let scope = NameScope::Directory {
                        module: module.name.clone(),
                        dir: obfuscated_dir.clone(),
                    };
                    let name = self.scopes.mint(&scope)?;
                    let target = format!(
                        "{}/{}{}",
                        obfuscated_dir,
                        name,
                        zip_path::file_suffix(&entry.path)
                    );
                    self.mapping.put_entry_file_mapping(raw_key.clone(), target.clone());
                    target
                }
            };
            rewrites.insert(raw_key, target)?;
        }
        Ok(rewrites)
    }

    /// Builds the obfuscated table: renamed entries, rewritten file
    /// references and recorded resource ids.
    pub fn rebuild_table(
        &mut self,
        table: &ResourceTable,
        rewrites: &PathRewrites,
    ) -> Result<ResourceTable> {
        let module = self.module;
        let mapping = &mut *self.mapping;
        let rebuilt = table.rebuild(|e| {
            let raw = e.full_name();
            let id = e.resource_id();
            mapping.put_resource_id(raw.clone(), id);
            let name = match mapping.resource(&raw) {
                Some(obfuscated) => table::entry_name_of(obfuscated)?.to_string(),
                None => e.entry.name.clone(),
            };
            let mut config_values = Vec::with_capacity(e.entry.config_values.len());
            for config_value in &e.entry.config_values {
                let rewritten = config_value.file_path().and_then(|path| {
                    let key = zip_path::join(module, path);
                    rewrites.get(&key).map(|target| (key, target))
                });
                match rewritten {
                    Some((key, target)) => {
                        mapping.put_resource_path_id(key, id);
                        config_values.push(config_value.with_file_path(target));
                    }
                    None => config_values.push(config_value.clone()),
                }
            }
            Ok(Entry {
                id: e.entry.id,
                name,
                config_values,
            })
        })?;
        rebuilt.validate()?;
        Ok(rebuilt)
    }
}
