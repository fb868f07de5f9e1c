//! Entry-level model of a module's resource table.
//!
//! The table is a plain tree of values: packages own types, types own entries,
//! entries own one [`ConfigValue`] per device configuration. Transformations
//! never mutate a table in place; [`ResourceTable::rebuild`] walks the tree and
//! assembles a new one bottom-up from the entries a stage produces.

use crate::{GuardError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Package id aapt assigns to the application's own resources.
pub const APP_PACKAGE_ID: u32 = 0x7f;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTable {
    #[serde(default)]
    pub packages: Vec<Package>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub types: Vec<ResourceType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceType {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    pub name: String,
    #[serde(default)]
    pub config_values: Vec<ConfigValue>,
}

/// One (device configuration, value) pair of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigValue {
    #[serde(default)]
    pub config: Configuration,
    pub value: Value,
}

/// Device configuration a value applies to. The default configuration has an
/// empty locale and no extra qualifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub locale: String,
    /// Remaining qualifiers in aapt order, e.g. `xxhdpi-v21`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub qualifiers: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Value {
    File(FileReference),
    Str { value: String },
    RawStr { value: String },
    Reference { name: String },
    Primitive { data: u32 },
    Compound { items: Vec<Value> },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileReference {
    /// Module-relative path, e.g. `res/drawable/icon.png`.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Packed `0xPPTTEEEE` resource identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(pub u32);

impl ResourceId {
    /// Packs the three ids into `0xPPTTEEEE`.
    pub fn new(package_id: u32, type_id: u32, entry_id: u32) -> Self {
        ResourceId(((package_id & 0xff) << 24) | ((type_id & 0xff) << 16) | (entry_id & 0xffff))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// `package.R.type.entry`
pub fn full_name(package: &str, type_name: &str, entry: &str) -> String {
    format!("{}.R.{}.{}", package, type_name, entry)
}

fn split_full_name(resource_name: &str) -> Result<(&str, &str)> {
    let rest = resource_name
        .find(".R.")
        .map(|idx| &resource_name[idx + 3..])
        .ok_or_else(|| {
            GuardError::Integrity(format!(
                "invalid resource name `{}`, it should be package.R.type.entry",
                resource_name
            ))
        })?;
    let mut parts = rest.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(type_name), Some(entry), None) => Ok((type_name, entry)),
        _ => Err(GuardError::Integrity(format!(
            "invalid resource name `{}`, it should be package.R.type.entry",
            resource_name
        ))),
    }
}

/// Entry part of a full resource name.
pub fn entry_name_of(resource_name: &str) -> Result<&str> {
    split_full_name(resource_name).map(|(_, entry)| entry)
}

impl Value {
    /// Path of a file value.
    pub fn file_path(&self) -> Option<&str> {
        match self {
            Value::File(file) => Some(&file.path),
            _ => None,
        }
    }
}

impl ConfigValue {
    pub fn file_path(&self) -> Option<&str> {
        self.value.file_path()
    }

    /// Copy of this value pointing at `path`. Non-file values are returned as is.
    pub fn with_file_path(&self, path: &str) -> ConfigValue {
        match &self.value {
            Value::File(file) => ConfigValue {
                config: self.config.clone(),
                value: Value::File(FileReference {
                    path: path.to_string(),
                    format: file.format.clone(),
                }),
            },
            _ => self.clone(),
        }
    }
}

/// Borrowed view of one entry together with its owning package and type.
#[derive(Debug, Clone, Copy)]
pub struct TableEntry<'a> {
    pub package: &'a Package,
    pub res_type: &'a ResourceType,
    pub entry: &'a Entry,
}

impl<'a> TableEntry<'a> {
    pub fn full_name(&self) -> String {
        full_name(&self.package.name, &self.res_type.name, &self.entry.name)
    }

    /// Id of the entry, with a missing entry id read as 0.
    pub fn resource_id(&self) -> ResourceId {
        ResourceId::new(
            self.package.id,
            self.res_type.id,
            self.entry.id.unwrap_or(0),
        )
    }
}

impl ResourceTable {
    /// True when the table has no package.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Every entry in table order: packages, then types, then entries.
    pub fn entries(&self) -> impl Iterator<Item = TableEntry<'_>> + '_ {
        self.packages.iter().flat_map(|package| {
            package.types.iter().flat_map(move |res_type| {
                res_type.entries.iter().map(move |entry| TableEntry {
                    package,
                    res_type,
                    entry,
                })
            })
        })
    }

    /// Every file path referenced by a config value, in table order.
    pub fn file_references(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries().flat_map(|e| {
            e.entry
                .config_values
                .iter()
                .filter_map(|cv| cv.file_path())
        })
    }

    /// Checks the structural invariants a decoded table must satisfy.
    pub fn validate(&self) -> Result<()> {
        check_package_ids(&self.packages)?;
        for package in &self.packages {
            for res_type in &package.types {
                let mut names = HashSet::new();
                for entry in &res_type.entries {
                    if !names.insert(entry.name.as_str()) {
                        return Err(GuardError::Integrity(format!(
                            "duplicate entry `{}`",
                            full_name(&package.name, &res_type.name, &entry.name)
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Builds a new table from the entries `f` produces for each entry of
    /// this one.
    ///
    /// Entries are folded into their type, types into their package and
    /// packages into the table, preserving order. Entries without an id get
    /// id 0, and an entry ending up with two identical config values is
    /// rejected.
    pub fn rebuild<F>(&self, mut f: F) -> Result<ResourceTable>
    where
        F: FnMut(TableEntry<'_>) -> Result<Entry>,
    {
        check_package_ids(&self.packages)?;
        let mut packages = Vec::with_capacity(self.packages.len());
        for package in &self.packages {
            let mut types = Vec::with_capacity(package.types.len());
            for res_type in &package.types {
                let mut entries = Vec::with_capacity(res_type.entries.len());
                for entry in &res_type.entries {
                    let mut rebuilt = f(TableEntry {
                        package,
                        res_type,
                        entry,
                    })?;
                    if rebuilt.id.is_none() {
                        rebuilt.id = Some(0);
                    }
                    check_configuration(&rebuilt)?;
                    entries.push(rebuilt);
                }
                types.push(ResourceType {
                    id: res_type.id,
                    name: res_type.name.clone(),
                    entries,
                });
            }
            packages.push(Package {
                id: package.id,
                name: package.name.clone(),
                types,
            });
        }
        Ok(ResourceTable { packages })
    }
}

fn check_package_ids(packages: &[Package]) -> Result<()> {
    let mut seen: HashMap<u32, &str> = HashMap::new();
    for package in packages {
        if seen.insert(package.id, &package.name).is_some() {
            return Err(GuardError::DuplicatePackageId {
                id: package.id,
                name: package.name.clone(),
            });
        }
    }
    Ok(())
}

fn check_configuration(entry: &Entry) -> Result<()> {
    let mut seen = HashSet::with_capacity(entry.config_values.len());
    for config_value in &entry.config_values {
        if !seen.insert(config_value) {
            return Err(GuardError::Integrity(format!(
                "duplicate configuration for entry: {}",
                entry.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn file_value(path: &str, locale: &str) -> ConfigValue {
        ConfigValue {
            config: Configuration {
                locale: locale.to_string(),
                qualifiers: String::new(),
            },
            value: Value::File(FileReference {
                path: path.to_string(),
                format: None,
            }),
        }
    }

    pub(crate) fn string_value(value: &str, locale: &str) -> ConfigValue {
        ConfigValue {
            config: Configuration {
                locale: locale.to_string(),
                qualifiers: String::new(),
            },
            value: Value::Str {
                value: value.to_string(),
            },
        }
    }

    pub(crate) fn entry(id: u32, name: &str, values: Vec<ConfigValue>) -> Entry {
        Entry {
            id: Some(id),
            name: name.to_string(),
            config_values: values,
        }
    }

    pub(crate) fn sample_table() -> ResourceTable {
        ResourceTable {
            packages: vec![Package {
                id: APP_PACKAGE_ID,
                name: "com.app".into(),
                types: vec![
                    ResourceType {
                        id: 1,
                        name: "drawable".into(),
                        entries: vec![
                            entry(0, "icon_large", vec![file_value("res/drawable/icon_large.png", "")]),
                            entry(1, "ic_launcher", vec![file_value("res/drawable/ic_launcher.png", "")]),
                        ],
                    },
                    ResourceType {
                        id: 2,
                        name: "string".into(),
                        entries: vec![entry(0, "app_name", vec![string_value("App", "")])],
                    },
                ],
            }],
        }
    }

    #[test]
    fn test_full_name_round_trip() {
        let name = full_name("com.app", "drawable", "icon");
        assert_eq!(name, "com.app.R.drawable.icon");
        assert_eq!(entry_name_of(&name).unwrap(), "icon");
        assert!(entry_name_of("com.app.drawable.icon").is_err());
        assert!(entry_name_of("com.app.R.style.Theme.Dark").is_err());
    }

    #[test]
    fn test_resource_id_formatting() {
        assert_eq!(ResourceId::new(0x7f, 1, 2).to_string(), "0x7f010002");
    }

    #[test]
    fn test_iterates_in_table_order() {
        let table = sample_table();
        let names: Vec<_> = table.entries().map(|e| e.full_name()).collect();
        assert_eq!(
            names,
            vec![
                "com.app.R.drawable.icon_large",
                "com.app.R.drawable.ic_launcher",
                "com.app.R.string.app_name"
            ]
        );
        let files: Vec<_> = table.file_references().collect();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_rebuild_assigns_missing_ids() {
        let mut table = sample_table();
        table.packages[0].types[0].entries[0].id = None;
        let rebuilt = table.rebuild(|e| Ok(e.entry.clone())).unwrap();
        assert_eq!(rebuilt.packages[0].types[0].entries[0].id, Some(0));
        assert_eq!(rebuilt.packages[0].types[1].entries[0], table.packages[0].types[1].entries[0]);
    }

    #[test]
    fn test_rebuild_rejects_duplicate_configuration() {
        let table = sample_table();
        let err = table
            .rebuild(|e| {
                let mut entry = e.entry.clone();
                if let Some(first) = entry.config_values.first().cloned() {
                    entry.config_values.push(first);
                }
                Ok(entry)
            })
            .unwrap_err();
        assert!(matches!(err, GuardError::Integrity(_)));
    }

    #[test]
    fn test_validate_rejects_duplicate_packages_and_entries() {
        let mut table = sample_table();
        table.packages.push(table.packages[0].clone());
        assert!(matches!(
            table.validate(),
            Err(GuardError::DuplicatePackageId { id: 0x7f, .. })
        ));

        let mut table = sample_table();
        let dup = table.packages[0].types[0].entries[0].clone();
        table.packages[0].types[0].entries.push(dup);
        assert!(matches!(table.validate(), Err(GuardError::Integrity(_))));
    }
}
