//! Stage sequencing for one run
//!
//! `analyze -> [file filter] -> [string filter] -> [merge] -> [obfuscate]
//! -> package -> [sign]`. Every stage takes the whole [`AppBundle`] and
//! returns a new one. The output archive is staged in a temporary file next
//! to the destination and only moved into place once packaging and signing
//! succeeded. The mapping and merge logs are staged the same way before
//! the output is published and moved into place right after it.

use crate::bundle::AppBundle;
use crate::codec::{JsonTableCodec, TableCodec};
use crate::file_filter::{BundleFileFilter, FileFilterReport};
use crate::mapping::ResourceMapping;
use crate::mapping_parser::read_mapping_file;
use crate::merger::{self, DuplicateResourceMerger, MergeReport};
use crate::name_generator::NameBlacklist;
use crate::obfuscator::ResourcesObfuscator;
use crate::packager::BundlePackager;
use crate::report::{format_elapsed, format_size, format_size_delta};
use crate::signer::{BundleSigner, SigningCredentials};
use crate::source::BundleSource;
use crate::string_filter::{read_unused_names, BundleStringFilter, StringFilterReport};
use crate::whitelist::WhitelistMatcher;
use crate::{GuardError, Result};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// File name of the mapping ledger written next to the output.
pub const MAPPING_FILE_NAME: &str = "resources-mapping.txt";

#[derive(Debug, Clone, Default)]
pub struct ObfuscationOptions {
    pub whitelist: Vec<String>,
    pub name_blacklist: Vec<String>,
    /// Mapping of a previous run to continue from.
    pub mapping_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct StringFilterOptions {
    pub unused_strings_path: Option<PathBuf>,
    pub locale_whitelist: Vec<String>,
}

/// Which stages run and with what rules. Stages left `None` are skipped.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub file_filter_rules: Option<Vec<String>>,
    pub string_filter: Option<StringFilterOptions>,
    pub merge_duplicated_res: bool,
    pub obfuscation: Option<ObfuscationOptions>,
    /// Directory for the mapping and merge logs; defaults to the output's
    /// directory.
    pub log_dir: Option<PathBuf>,
    pub signing: Option<SigningCredentials>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTiming {
    pub stage: &'static str,
    pub elapsed: Duration,
}

/// What a run did.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub stages: Vec<StageTiming>,
    pub input_size: u64,
    pub output_size: u64,
    pub file_filter: Option<FileFilterReport>,
    pub string_filter: Option<StringFilterReport>,
    pub merge_reports: Vec<MergeReport>,
    pub merge_logs: Vec<PathBuf>,
    pub mapping_path: Option<PathBuf>,
    pub signed: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    fn record(&mut self, stage: &'static str, started: Instant) {
        let elapsed = started.elapsed();
        info!(stage, elapsed = %format_elapsed(elapsed), "stage finished");
        self.stages.push(StageTiming { stage, elapsed });
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-----------------------------------------")?;
        for timing in &self.stages {
            writeln!(f, " {:<12} {}", timing.stage, format_elapsed(timing.elapsed))?;
        }
        writeln!(f, "-----------------------------------------")?;
        writeln!(f, " Input size:     {}", format_size(self.input_size))?;
        writeln!(f, " Output size:    {}", format_size(self.output_size))?;
        writeln!(
            f,
            " Reduced size:   {}",
            format_size_delta(self.input_size, self.output_size)
        )?;
        if let Some(mapping) = &self.mapping_path {
            writeln!(f, " Mapping:        {}", mapping.display())?;
        }
        writeln!(f, " Signed:         {}", if self.signed { "yes" } else { "no" })?;
        write!(f, " Total time:     {}", format_elapsed(self.elapsed))
    }
}

struct CompiledObfuscation {
    whitelist: WhitelistMatcher,
    blacklist: NameBlacklist,
    prior: ResourceMapping,
}

/// A configured run. Construction compiles every rule and loads the prior
/// mapping, so configuration problems surface before any work starts.
pub struct Pipeline {
    codec: Box<dyn TableCodec>,
    file_filter: Option<BundleFileFilter>,
    string_filter: Option<BundleStringFilter>,
    merge_duplicated_res: bool,
    obfuscation: Option<CompiledObfuscation>,
    log_dir: Option<PathBuf>,
    signing: Option<SigningCredentials>,
}

impl Pipeline {
    /// Validates the options and loads the prior mapping, before any input is read.
    pub fn new(options: PipelineOptions) -> Result<Self> {
        let file_filter = match &options.file_filter_rules {
            Some(rules) => Some(BundleFileFilter::new(rules)?),
            None => None,
        };

        let string_filter = match &options.string_filter {
            Some(opts) => {
                let unused = match &opts.unused_strings_path {
                    Some(path) => read_unused_names(path)?,
                    None => HashSet::new(),
                };
                let locales: HashSet<String> = opts
                    .locale_whitelist
                    .iter()
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty())
                    .collect();
                Some(BundleStringFilter::new(unused, locales))
            }
            None => None,
        };

        let obfuscation = match &options.obfuscation {
            Some(opts) => {
                let prior = match &opts.mapping_path {
                    Some(path) => {
                        if !path.is_file() {
                            return Err(GuardError::Configuration(format!(
                                "mapping file {} does not exist",
                                path.display()
                            )));
                        }
                        read_mapping_file(path)?
                    }
                    None => ResourceMapping::new(),
                };
                prior.check_dir_rules()?;
                Some(CompiledObfuscation {
                    whitelist: WhitelistMatcher::new(&opts.whitelist)?,
                    blacklist: NameBlacklist::new(&opts.name_blacklist)?,
                    prior,
                })
            }
            None => None,
        };

        if let Some(credentials) = &options.signing {
            credentials.validate()?;
        }

        Ok(Self {
            codec: Box::new(JsonTableCodec),
            file_filter,
            string_filter,
            merge_duplicated_res: options.merge_duplicated_res,
            obfuscation,
            log_dir: options.log_dir,
            signing: options.signing,
        })
    }

    /// Replaces the resource table codec.
    pub fn with_codec(mut self, codec: Box<dyn TableCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Runs every enabled stage over `input` and publishes the result at `output`.
    pub fn run(
        &self,
        input: &Path,
        output: &Path,
        signer: Option<&dyn BundleSigner>,
    ) -> Result<RunSummary> {
        let run_started = Instant::now();
        let mut summary = RunSummary::default();

        let started = Instant::now();
        let mut source = BundleSource::open(input)?;
        summary.input_size = source.file_size()?;
        let mut bundle = source.analyze(self.codec.as_ref())?;
        summary.record("analyze", started);

        if let Some(filter) = &self.file_filter {
            let started = Instant::now();
            let (filtered, report) = filter.filter(bundle, &mut source)?;
            bundle = filtered;
            summary.file_filter = Some(report);
            summary.record("filter-file", started);
        }

        if let Some(filter) = &self.string_filter {
            let started = Instant::now();
            let (filtered, report) = filter.filter(bundle)?;
            bundle = filtered;
            summary.string_filter = Some(report);
            summary.record("filter-string", started);
        }

        let mut merged_modules = Vec::new();
        if self.merge_duplicated_res {
            let started = Instant::now();
            merged_modules = bundle.modules.iter().map(|m| m.name.clone()).collect();
            let (merged, reports) = DuplicateResourceMerger::new().merge(bundle, &mut source)?;
            bundle = merged;
            summary.merge_reports = reports;
            summary.record("merge", started);
        }

        let mut mapping = None;
        if let Some(obfuscation) = &self.obfuscation {
            let started = Instant::now();
            let mut obfuscator = ResourcesObfuscator::new(
                &obfuscation.whitelist,
                &obfuscation.blacklist,
                obfuscation.prior.clone(),
            );
            bundle = obfuscator.obfuscate(bundle)?;
            mapping = Some(obfuscator.into_mapping());
            summary.record("obfuscate", started);
        }

        let started = Instant::now();
        let staged = self.package(&bundle, &mut source, output)?;
        summary.record("package", started);

        match (signer, &self.signing) {
            (Some(signer), Some(credentials)) => {
                let started = Instant::now();
                signer.sign(staged.path(), credentials)?;
                summary.signed = true;
                summary.record("sign", started);
            }
            (Some(_), None) => warn!("no signing credentials, output is unsigned"),
            _ => {}
        }

        let log_dir = self.log_dir(output);
        let staged_mapping = mapping
            .as_ref()
            .map(|mapping| mapping.stage_in(&log_dir))
            .transpose()?;
        let mut staged_logs = Vec::with_capacity(summary.merge_reports.len());
        for report in &summary.merge_reports {
            staged_logs.push((report.stage_in(&log_dir)?, log_dir.join(report.log_file_name())));
        }

        staged.persist(output)?;
        summary.output_size = std::fs::metadata(output)?.len();

        if let Some(staged_mapping) = staged_mapping {
            let path = log_dir.join(MAPPING_FILE_NAME);
            staged_mapping.persist(&path)?;
            summary.mapping_path = Some(path);
        }
        for module in &merged_modules {
            merger::remove_stale_log(&log_dir, module)?;
        }
        for (staged_log, path) in staged_logs {
            staged_log.persist(&path)?;
            summary.merge_logs.push(path);
        }

        summary.elapsed = run_started.elapsed();
        info!(
            output = %output.display(),
            input_size = %format_size(summary.input_size),
            output_size = %format_size(summary.output_size),
            elapsed = %format_elapsed(summary.elapsed),
            "run finished"
        );
        Ok(summary)
    }

    fn package(
        &self,
        bundle: &AppBundle,
        source: &mut BundleSource,
        output: &Path,
    ) -> Result<tempfile::NamedTempFile> {
        let dir = parent_dir(output);
        std::fs::create_dir_all(&dir)?;
        let mut staged = tempfile::Builder::new()
            .prefix(".bundleguard-")
            .suffix(".aab")
            .tempfile_in(&dir)?;
        BundlePackager::new(self.codec.as_ref()).write(bundle, source, staged.as_file_mut())?;
        Ok(staged)
    }

    fn log_dir(&self, output: &Path) -> PathBuf {
        match &self.log_dir {
            Some(dir) => dir.clone(),
            None => parent_dir(output),
        }
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
