use crate::settings::{Settings, SettingsOverrides};
use crate::signing::{debug_signing_credentials, jarsigner_executable, JarSigner, Platform};
use crate::xml_config::load_xml_config;
use anyhow::{Context, Result};
use bundleguard_core::{BundleSigner, GuardError, Pipeline, SigningCredentials};
use clap::{Args, Parser, Subcommand};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "bundleguard", version)]
#[command(about = "Shrinks and obfuscates the resources of Android App Bundles")]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every command.
#[derive(Args, Debug, Clone)]
pub struct BundleArgs {
    /// Input bundle (.aab)
    #[arg(long)]
    pub bundle: PathBuf,
    /// Output bundle (.aab)
    #[arg(long)]
    pub output: PathBuf,
    #[arg(long)]
    pub store_file: Option<PathBuf>,
    #[arg(long)]
    pub store_password: Option<String>,
    #[arg(long)]
    pub key_alias: Option<String>,
    #[arg(long)]
    pub key_password: Option<String>,
    /// Leave the output unsigned
    #[arg(long)]
    pub disable_sign: bool,
    /// Settings file (TOML, YAML or JSON)
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Obfuscate resource names and file paths
    ObfuscateBundle {
        #[command(flatten)]
        args: BundleArgs,
        /// XML configuration with whitelist and filters
        #[arg(long)]
        config: Option<PathBuf>,
        /// Mapping of a previous run to keep names stable
        #[arg(long)]
        mapping: Option<PathBuf>,
        /// Merge byte-identical resource files first
        #[arg(long)]
        merge_duplicated_res: bool,
    },
    /// Merge byte-identical resource files
    MergeDuplicatedRes {
        #[command(flatten)]
        args: BundleArgs,
    },
    /// Remove archive entries matching the XML filter rules
    FilterFile {
        #[command(flatten)]
        args: BundleArgs,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Strip unused strings and unwanted locales
    FilterString {
        #[command(flatten)]
        args: BundleArgs,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Dispatches the parsed command.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::ObfuscateBundle {
            args,
            config,
            mapping,
            merge_duplicated_res,
        } => obfuscate_bundle_command(args, config, mapping, merge_duplicated_res),
        Commands::MergeDuplicatedRes { args } => merge_duplicated_res_command(args),
        Commands::FilterFile { args, config } => filter_file_command(args, config),
        Commands::FilterString { args, config } => filter_string_command(args, config),
    }
}

/// Obfuscates, optionally merging duplicates first.
pub fn obfuscate_bundle_command(
    args: BundleArgs,
    config: Option<PathBuf>,
    mapping: Option<PathBuf>,
    merge_duplicated_res: bool,
) -> Result<()> {
    check_bundle_paths(&args, true)?;
    let overrides = SettingsOverrides {
        merge_duplicated_res: merge_duplicated_res.then_some(true),
        mapping_path: mapping,
        disable_sign: args.disable_sign.then_some(true),
    };
    let mut settings = load_settings(&args, config.as_deref(), &overrides)?;
    if let Some(mapping) = &settings.mapping_path {
        check_mapping_path(mapping)?;
    }
    settings.enable_obfuscation = true;
    execute("obfuscate-bundle", &args, &settings)
}

/// Only merges duplicate resources.
pub fn merge_duplicated_res_command(args: BundleArgs) -> Result<()> {
    check_bundle_paths(&args, false)?;
    let overrides = SettingsOverrides {
        disable_sign: args.disable_sign.then_some(true),
        ..SettingsOverrides::default()
    };
    let mut settings = load_settings(&args, None, &overrides)?;
    settings.enable_obfuscation = false;
    settings.merge_duplicated_res = true;
    settings.filter_file = false;
    settings.filter_strings = false;
    execute("merge-duplicated-res", &args, &settings)
}

/// Only drops files matching the configured filter rules.
pub fn filter_file_command(args: BundleArgs, config: Option<PathBuf>) -> Result<()> {
    check_bundle_paths(&args, false)?;
    let overrides = SettingsOverrides {
        disable_sign: args.disable_sign.then_some(true),
        ..SettingsOverrides::default()
    };
    let mut settings = load_settings(&args, config.as_deref(), &overrides)?;
    if !settings.filter_file {
        return Err(configuration("file filter is not active, enable <filter isactive=\"true\">"));
    }
    settings.enable_obfuscation = false;
    settings.merge_duplicated_res = false;
    settings.filter_strings = false;
    execute("filter-file", &args, &settings)
}

/// Only strips unused and non-whitelisted-locale strings.
pub fn filter_string_command(args: BundleArgs, config: Option<PathBuf>) -> Result<()> {
    check_bundle_paths(&args, false)?;
    let overrides = SettingsOverrides {
        disable_sign: args.disable_sign.then_some(true),
        ..SettingsOverrides::default()
    };
    let mut settings = load_settings(&args, config.as_deref(), &overrides)?;
    if !settings.filter_strings {
        return Err(configuration(
            "string filter is not active, enable <filter-str isactive=\"true\">",
        ));
    }
    settings.enable_obfuscation = false;
    settings.merge_duplicated_res = false;
    settings.filter_file = false;
    execute("filter-string", &args, &settings)
}

fn configuration(message: impl Into<String>) -> anyhow::Error {
    GuardError::Configuration(message.into()).into()
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Input must exist; both sides must be `.aab`. Only commands that may
/// replace their output accept an existing one.
pub fn check_bundle_paths(args: &BundleArgs, overwrite: bool) -> Result<()> {
    if !has_extension(&args.bundle, "aab") {
        return Err(configuration(format!(
            "input {} is not an .aab file",
            args.bundle.display()
        )));
    }
    if !args.bundle.is_file() {
        return Err(configuration(format!(
            "input {} does not exist",
            args.bundle.display()
        )));
    }
    if !has_extension(&args.output, "aab") {
        return Err(configuration(format!(
            "output {} is not an .aab file",
            args.output.display()
        )));
    }
    if !overwrite && args.output.exists() {
        return Err(configuration(format!(
            "output {} already exists",
            args.output.display()
        )));
    }
    Ok(())
}

/// A given mapping must be an existing `.txt` file.
pub fn check_mapping_path(mapping: &Path) -> Result<()> {
    if !has_extension(mapping, "txt") {
        return Err(configuration(format!(
            "mapping {} is not a .txt file",
            mapping.display()
        )));
    }
    if !mapping.is_file() {
        return Err(configuration(format!(
            "mapping {} does not exist",
            mapping.display()
        )));
    }
    Ok(())
}

fn load_settings(
    args: &BundleArgs,
    config: Option<&Path>,
    overrides: &SettingsOverrides,
) -> Result<Settings> {
    let mut settings = Settings::load(args.settings.as_deref(), overrides)
        .context("failed to load settings")?;
    if let Some(path) = config {
        let xml = load_xml_config(path)
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        settings.apply_xml(&xml);
    }
    Ok(settings)
}

fn env_path(name: &str) -> Option<PathBuf> {
    env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Explicit keystore flags win; otherwise the debug keystore when present.
pub fn resolve_credentials(args: &BundleArgs) -> Result<Option<SigningCredentials>> {
    if let Some(store_file) = &args.store_file {
        let credentials = SigningCredentials::new(
            store_file.clone(),
            args.store_password.clone().unwrap_or_default(),
            args.key_alias.clone().unwrap_or_default(),
            args.key_password.clone().unwrap_or_default(),
        )?;
        return Ok(Some(credentials));
    }
    let credentials = debug_signing_credentials(
        env_path("ANDROID_SDK_HOME").as_deref(),
        env_path("HOME").as_deref(),
    );
    if credentials.is_none() {
        warn!("no keystore given and no debug keystore found");
    }
    Ok(credentials)
}

fn execute(command: &str, args: &BundleArgs, settings: &Settings) -> Result<()> {
    let (credentials, signer) = if settings.disable_sign {
        (None, None)
    } else {
        let signer = JarSigner::new(jarsigner_executable(
            env_path("JAVA_HOME").as_deref(),
            Platform::current(),
        ));
        (resolve_credentials(args)?, Some(signer))
    };

    let pipeline = Pipeline::new(settings.pipeline_options(credentials))?;
    info!(
        command,
        bundle = %args.bundle.display(),
        output = %args.output.display(),
        "starting"
    );
    let summary = pipeline
        .run(
            &args.bundle,
            &args.output,
            signer.as_ref().map(|s| s as &dyn BundleSigner),
        )
        .with_context(|| format!("{} failed for {}", command, args.bundle.display()))?;

    println!("{}", summary);
    Ok(())
}
