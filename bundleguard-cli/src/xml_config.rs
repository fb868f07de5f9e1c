//! Legacy `config.xml` support
//!
//! ```xml
//! <resproguard>
//!     <issue id="whitelist" isactive="true">
//!         <path value="*.R.drawable.ic_launcher"/>
//!     </issue>
//!     <filter isactive="true">
//!         <rule value="lib/x86/*"/>
//!     </filter>
//!     <filter-str isactive="true">
//!         <path value="unused.txt"/>
//!         <language value="en"/>
//!     </filter-str>
//! </resproguard>
//! ```

use crate::settings::SettingsError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlConfig {
    pub use_whitelist: bool,
    pub whitelist: Vec<String>,
    pub file_filter_active: bool,
    pub file_filter_rules: Vec<String>,
    pub string_filter_active: bool,
    pub unused_strings_path: Option<PathBuf>,
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Whitelist,
    OtherIssue,
    FileFilter,
    StringFilter,
}

struct ConfigReader {
    config: XmlConfig,
    section: Section,
}

impl ConfigReader {
    fn open(&mut self, tag: &str, attrs: &HashMap<String, String>) -> Result<(), SettingsError> {
        match tag {
            "issue" => {
                if attrs.get("id").map(String::as_str) == Some("whitelist") {
                    self.config.use_whitelist = is_active(attrs);
                    self.section = Section::Whitelist;
                } else {
                    self.section = Section::OtherIssue;
                }
            }
            "filter" => {
                self.config.file_filter_active = is_active(attrs);
                self.section = Section::FileFilter;
            }
            "filter-str" => {
                self.config.string_filter_active = is_active(attrs);
                self.section = Section::StringFilter;
            }
            "path" => match self.section {
                Section::Whitelist => {
                    let value = value_of(tag, attrs)?;
                    if self.config.use_whitelist && !value.is_empty() {
                        self.config.whitelist.push(value);
                    }
                }
                Section::StringFilter => {
                    let value = value_of(tag, attrs)?;
                    if !value.is_empty() {
                        self.config.unused_strings_path = Some(PathBuf::from(value));
                    }
                }
                _ => {}
            },
            "rule" if self.section == Section::FileFilter => {
                let value = value_of(tag, attrs)?;
                if !value.is_empty() {
                    self.config.file_filter_rules.push(value);
                }
            }
            "language" if self.section == Section::StringFilter => {
                let value = value_of(tag, attrs)?;
                if !value.is_empty() {
                    self.config.languages.push(value);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, tag: &str) {
        if matches!(tag, "issue" | "filter" | "filter-str") {
            self.section = Section::Root;
        }
    }
}

fn is_active(attrs: &HashMap<String, String>) -> bool {
    attrs
        .get("isactive")
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn value_of(tag: &str, attrs: &HashMap<String, String>) -> Result<String, SettingsError> {
    attrs
        .get("value")
        .map(|v| v.trim().to_string())
        .ok_or_else(|| SettingsError::Invalid(format!("<{}> element without a value attribute", tag)))
}

fn xml_error(reason: impl ToString) -> SettingsError {
    SettingsError::Xml {
        reason: reason.to_string(),
    }
}

fn tag_of(element: &BytesStart<'_>) -> Result<String, SettingsError> {
    std::str::from_utf8(element.name().as_ref())
        .map(str::to_string)
        .map_err(xml_error)
}

fn attributes_of(element: &BytesStart<'_>) -> Result<HashMap<String, String>, SettingsError> {
    let mut attrs = HashMap::new();
    for attr in element.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(xml_error)?;
        let value = attr.unescape_value().map_err(xml_error)?;
        attrs.insert(key.to_string(), value.into_owned());
    }
    Ok(attrs)
}

/// Parses the `<resproguard>` document.
pub fn parse_xml_config(xml: &str) -> Result<XmlConfig, SettingsError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut state = ConfigReader {
        config: XmlConfig::default(),
        section: Section::Root,
    };

    let mut buffer = Vec::new();
    loop {
        match reader.read_event_into(&mut buffer).map_err(xml_error)? {
            Event::Start(element) => {
                let tag = tag_of(&element)?;
                state.open(&tag, &attributes_of(&element)?)?;
            }
            Event::Empty(element) => {
                let tag = tag_of(&element)?;
                state.open(&tag, &attributes_of(&element)?)?;
                state.close(&tag);
            }
            Event::End(element) => {
                let tag = std::str::from_utf8(element.name().as_ref())
                    .map_err(xml_error)?
                    .to_string();
                state.close(&tag);
            }
            Event::Eof => break,
            _ => {}
        }
        buffer.clear();
    }
    Ok(state.config)
}

/// Reads and parses an XML config file.
pub fn load_xml_config(path: &Path) -> Result<XmlConfig, SettingsError> {
    let is_xml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("xml"))
        .unwrap_or(false);
    if !is_xml {
        return Err(SettingsError::Invalid(format!(
            "configuration {} is not an .xml file",
            path.display()
        )));
    }
    let content = fs::read_to_string(path)?;
    parse_xml_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<resproguard>
    <!-- resources kept as is -->
    <issue id="whitelist" isactive="true">
        <path value="*.R.drawable.ic_launcher"/>
        <path value="  *.R.string.app_name "/>
    </issue>
    <issue id="property" isactive="true">
        <path value="ignored"/>
    </issue>
    <filter isactive="true">
        <rule value="lib/x86/*"/>
        <rule value="BUNDLE-METADATA/com.android.tools.build.obfuscation/*"/>
    </filter>
    <filter-str isactive="false">
        <path value="build/unused.txt"/>
        <language value="en"/>
        <language value="zh"/>
    </filter-str>
</resproguard>"#;

    #[test]
    fn test_reads_every_section() {
        let config = parse_xml_config(FULL).unwrap();
        assert!(config.use_whitelist);
        assert_eq!(
            config.whitelist,
            vec!["*.R.drawable.ic_launcher", "*.R.string.app_name"]
        );
        assert!(config.file_filter_active);
        assert_eq!(config.file_filter_rules.len(), 2);
        assert!(!config.string_filter_active);
        assert_eq!(config.unused_strings_path, Some(PathBuf::from("build/unused.txt")));
        assert_eq!(config.languages, vec!["en", "zh"]);
    }

    #[test]
    fn test_inactive_whitelist_is_ignored() {
        let xml = r#"<resproguard>
            <issue id="whitelist" isactive="false"><path value="*.R.id.*"/></issue>
        </resproguard>"#;
        let config = parse_xml_config(xml).unwrap();
        assert!(!config.use_whitelist);
        assert!(config.whitelist.is_empty());
    }

    #[test]
    fn test_missing_value_is_rejected() {
        let xml = r#"<resproguard><filter isactive="true"><rule/></filter></resproguard>"#;
        assert!(matches!(parse_xml_config(xml), Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn test_malformed_document_is_rejected() {
        let xml = r#"<resproguard><filter isactive="true"></resproguard>"#;
        assert!(matches!(parse_xml_config(xml), Err(SettingsError::Xml { .. })));
    }

    #[test]
    fn test_requires_xml_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.txt");
        fs::write(&path, FULL).unwrap();
        assert!(matches!(load_xml_config(&path), Err(SettingsError::Invalid(_))));

        let path = dir.path().join("config.xml");
        fs::write(&path, FULL).unwrap();
        assert!(load_xml_config(&path).unwrap().file_filter_active);
    }
}
