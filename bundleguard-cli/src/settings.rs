//! Layered run settings
//!
//! Built-in defaults, then an optional settings file (TOML, YAML or JSON by
//! extension), then `BUNDLEGUARD_*` environment variables, then command line
//! overrides. List settings come from files only.

use crate::xml_config::XmlConfig;
use bundleguard_core::{
    ObfuscationOptions, PipelineOptions, SigningCredentials, StringFilterOptions,
};
use config as config_rs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_PREFIX: &str = "BUNDLEGUARD";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] config_rs::ConfigError),
    #[error("xml error: {reason}")]
    Xml { reason: String },
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub enable_obfuscation: bool,
    pub merge_duplicated_res: bool,
    pub filter_file: bool,
    pub file_filter_rules: Vec<String>,
    pub filter_strings: bool,
    pub unused_strings_path: Option<PathBuf>,
    pub locale_whitelist: Vec<String>,
    pub whitelist: Vec<String>,
    pub name_blacklist: Vec<String>,
    pub mapping_path: Option<PathBuf>,
    pub disable_sign: bool,
    pub log_dir: Option<PathBuf>,
}

/// Values given on the command line; `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub merge_duplicated_res: Option<bool>,
    pub mapping_path: Option<PathBuf>,
    pub disable_sign: Option<bool>,
}

impl Settings {
    /// Layers defaults, `file`, the environment and `overrides`, in that order.
    pub fn load(file: Option<&Path>, overrides: &SettingsOverrides) -> Result<Self, SettingsError> {
        let mut builder = config_rs::Config::builder()
            .set_default("enable_obfuscation", false)?
            .set_default("merge_duplicated_res", false)?
            .set_default("filter_file", false)?
            .set_default("filter_strings", false)?
            .set_default("disable_sign", false)?;

        if let Some(path) = file {
            if !path.is_file() {
                return Err(SettingsError::Invalid(format!(
                    "settings file {} does not exist",
                    path.display()
                )));
            }
            builder = builder.add_source(config_rs::File::from(path));
        }

        builder = builder.add_source(config_rs::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        if let Some(merge) = overrides.merge_duplicated_res {
            builder = builder.set_override("merge_duplicated_res", merge)?;
        }
        if let Some(mapping) = &overrides.mapping_path {
            builder = builder.set_override("mapping_path", mapping.to_string_lossy().into_owned())?;
        }
        if let Some(disable) = overrides.disable_sign {
            builder = builder.set_override("disable_sign", disable)?;
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Folds a legacy XML configuration into these settings.
    pub fn apply_xml(&mut self, xml: &XmlConfig) {
        if xml.use_whitelist {
            for rule in &xml.whitelist {
                if !self.whitelist.contains(rule) {
                    self.whitelist.push(rule.clone());
                }
            }
        }
        if xml.file_filter_active {
            self.filter_file = true;
            self.file_filter_rules.extend(xml.file_filter_rules.iter().cloned());
        }
        if xml.string_filter_active {
            self.filter_strings = true;
            if xml.unused_strings_path.is_some() {
                self.unused_strings_path = xml.unused_strings_path.clone();
            }
            self.locale_whitelist.extend(xml.languages.iter().cloned());
        }
    }

    /// Translates the switches into stage options.
    pub fn pipeline_options(&self, signing: Option<SigningCredentials>) -> PipelineOptions {
        PipelineOptions {
            file_filter_rules: self.filter_file.then(|| self.file_filter_rules.clone()),
            string_filter: self.filter_strings.then(|| StringFilterOptions {
                unused_strings_path: self.unused_strings_path.clone(),
                locale_whitelist: self.locale_whitelist.clone(),
            }),
            merge_duplicated_res: self.merge_duplicated_res,
            obfuscation: self.enable_obfuscation.then(|| ObfuscationOptions {
                whitelist: self.whitelist.clone(),
                name_blacklist: self.name_blacklist.clone(),
                mapping_path: self.mapping_path.clone(),
            }),
            log_dir: self.log_dir.clone(),
            signing,
        }
    }
}
