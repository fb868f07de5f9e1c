//! Bundle fixtures shared by the integration tests

#![allow(dead_code)]

use bundleguard_core::{
    ConfigValue, Configuration, Entry, FileReference, JsonTableCodec, Package, ResourceTable,
    ResourceType, TableCodec, Value,
};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

pub const PNG_A: &[u8] = b"\x89PNG\r\n\x1a\nfirst image bytes";
pub const PNG_B: &[u8] = b"\x89PNG\r\n\x1a\nsecond image bytes";

pub fn file(path: &str) -> ConfigValue {
    ConfigValue {
        config: Configuration::default(),
        value: Value::File(FileReference {
            path: path.to_string(),
            format: None,
        }),
    }
}

pub fn text(value: &str, locale: &str) -> ConfigValue {
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

pub fn entry(id: u32, name: &str, config_values: Vec<ConfigValue>) -> Entry {
    Entry {
        id: Some(id),
        name: name.to_string(),
        config_values,
    }
}

pub fn res_type(id: u32, name: &str, entries: Vec<Entry>) -> ResourceType {
    ResourceType {
        id,
        name: name.to_string(),
        entries,
    }
}

pub fn app_table(types: Vec<ResourceType>) -> ResourceTable {
    ResourceTable {
        packages: vec![Package {
            id: 0x7f,
            name: "com.app".to_string(),
            types,
        }],
    }
}

/// Builder for a bundle archive on disk.
#[derive(Default)]
pub struct BundleFixture {
    files: Vec<(String, Vec<u8>)>,
}

impl BundleFixture {
    pub fn new() -> Self {
        Self::default()
            .with("BundleConfig.pb", b"bundle-config")
            .with("base/manifest/AndroidManifest.xml", b"<manifest/>")
    }

    pub fn with(mut self, name: &str, bytes: &[u8]) -> Self {
        self.files.push((name.to_string(), bytes.to_vec()));
        self
    }

    pub fn with_table(self, module: &str, table: &ResourceTable) -> Self {
        let bytes = JsonTableCodec.encode(table).expect("encode table");
        self.with(&format!("{}/{}", module, JsonTableCodec::FILE_NAME), &bytes)
    }

    pub fn write(&self, path: &Path) {
        let file = File::create(path).expect("create fixture");
        let mut writer = ZipWriter::new(file);
        for (name, bytes) in &self.files {
            writer
                .start_file(name.as_str(), FileOptions::default())
                .expect("start entry");
            writer.write_all(bytes).expect("write entry");
        }
        writer.finish().expect("finish fixture");
    }
}

/// Every file entry of an archive with its bytes.
pub fn read_archive(path: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut archive = ZipArchive::new(File::open(path).expect("open archive")).expect("read archive");
    let mut files = BTreeMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).expect("entry");
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).expect("read entry");
        files.insert(entry.name().to_string(), bytes);
    }
    files
}

pub fn read_table(files: &BTreeMap<String, Vec<u8>>, module: &str) -> ResourceTable {
    let bytes = &files[&format!("{}/{}", module, JsonTableCodec::FILE_NAME)];
    JsonTableCodec.decode(bytes).expect("decode table")
}

/// Two drawables backed by files and one string.
pub fn sample_table() -> ResourceTable {
    app_table(vec![
        res_type(
            1,
            "drawable",
            vec![
                entry(0, "icon_large", vec![file("res/drawable/icon_large.png")]),
                entry(1, "ic_launcher", vec![file("res/drawable/ic_launcher.png")]),
            ],
        ),
        res_type(2, "string", vec![entry(0, "app_name", vec![text("App", "")])]),
    ])
}

pub fn sample_bundle() -> BundleFixture {
    BundleFixture::new()
        .with_table("base", &sample_table())
        .with("base/res/drawable/icon_large.png", PNG_A)
        .with("base/res/drawable/ic_launcher.png", PNG_B)
        .with("base/dex/classes.dex", b"dex")
}
