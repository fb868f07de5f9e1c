//! BundleGuard: resource obfuscation and duplicate merging for Android App Bundles

pub mod bundle;
pub mod codec;
pub mod entries;
pub mod errors;
pub mod file_filter;
pub mod mapping;
pub mod mapping_parser;
pub mod merger;
pub mod name_generator;
pub mod obfuscator;
pub mod packager;
pub mod pipeline;
pub mod report;
pub mod rewriter;
pub mod signer;
pub mod source;
pub mod string_filter;
pub mod table;
pub mod whitelist;
pub mod zip_path;

// Re-exports
pub use bundle::{AppBundle, BundleModule, EntryContent, EntryStore, ModuleEntry};
pub use codec::{JsonTableCodec, TableCodec};
pub use errors::{ErrorKind, GuardError, Result};
pub use file_filter::{BundleFileFilter, FileFilterReport};
pub use mapping::ResourceMapping;
pub use mapping_parser::{parse_mapping, read_mapping_file};
pub use merger::{DuplicateRecord, DuplicateResourceMerger, MergeReport};
pub use name_generator::{NameBlacklist, NameGenerator};
pub use obfuscator::ResourcesObfuscator;
pub use packager::BundlePackager;
pub use pipeline::{
    ObfuscationOptions, Pipeline, PipelineOptions, RunSummary, StringFilterOptions,
    MAPPING_FILE_NAME,
};
pub use signer::{BundleSigner, SigningCredentials};
pub use source::BundleSource;
pub use string_filter::{BundleStringFilter, StringFilterReport};
pub use table::{
    ConfigValue, Configuration, Entry, FileReference, Package, ResourceId, ResourceTable,
    ResourceType, Value,
};
pub use whitelist::WhitelistMatcher;
