//! Writing the transformed bundle

use crate::bundle::{AppBundle, EntryContent, ModuleEntry};
use crate::codec::TableCodec;
use crate::source::BundleSource;
use crate::zip_path::{self, METADATA_DIRECTORY};
use crate::Result;
use std::io::{Seek, Write};
use tracing::debug;
use zip::write::FileOptions;
use zip::ZipWriter;

pub struct BundlePackager<'a> {
    codec: &'a dyn TableCodec,
}

impl<'a> BundlePackager<'a> {
    /// Packager encoding tables with `codec`.
    pub fn new(codec: &'a dyn TableCodec) -> Self {
        Self { codec }
    }

    /// Writes `bundle` as a zip archive. Archived entries are copied with
    /// their compressed data untouched; tables are re-encoded.
    pub fn write<W: Write + Seek>(
        &self,
        bundle: &AppBundle,
        source: &mut BundleSource,
        out: W,
    ) -> Result<()> {
        let mut writer = ZipWriter::new(out);

        for entry in &bundle.root_entries {
            copy_entry(&mut writer, source, entry, entry.path.clone())?;
        }
        for module in &bundle.modules {
            if let Some(table) = &module.table {
                let bytes = self.codec.encode(table)?;
                writer.start_file(
                    module.qualified_path(self.codec.file_name()),
                    FileOptions::default(),
                )?;
                writer.write_all(&bytes)?;
            }
            for entry in &module.entries {
                copy_entry(&mut writer, source, entry, module.qualified_path(&entry.path))?;
            }
        }
        for entry in &bundle.metadata {
            copy_entry(
                &mut writer,
                source,
                entry,
                zip_path::join(METADATA_DIRECTORY, &entry.path),
            )?;
        }

        writer.finish()?;
        debug!(entries = bundle.entry_count(), "packaged bundle");
        Ok(())
    }
}

fn copy_entry<W: Write + Seek>(
    writer: &mut ZipWriter<W>,
    source: &mut BundleSource,
    entry: &ModuleEntry,
    name: String,
) -> Result<()> {
    match &entry.content {
        EntryContent::Archived { source_name } => {
            let raw = source.raw_entry(source_name)?;
            writer.raw_copy_file_rename(raw, name)?;
        }
        EntryContent::Bytes(bytes) => {
            writer.start_file(name, FileOptions::default())?;
            writer.write_all(bytes)?;
        }
    }
    Ok(())
}
