//! Resource table codec seam

use crate::table::ResourceTable;
use crate::Result;

/// Encodes and decodes a module's resource table file.
///
/// The engine only ever sees the entry-level [`ResourceTable`] model; the
/// on-disk encoding is owned entirely by the codec.
pub trait TableCodec {
    /// Module-relative name of the table file, e.g. `resources.json`.
    fn file_name(&self) -> &str;

    fn decode(&self, bytes: &[u8]) -> Result<ResourceTable>;

    fn encode(&self, table: &ResourceTable) -> Result<Vec<u8>>;
}

/// Stores the entry-level model as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTableCodec;

impl JsonTableCodec {
    pub const FILE_NAME: &'static str = "resources.json";
}

impl TableCodec for JsonTableCodec {
    fn file_name(&self) -> &str {
        Self::FILE_NAME
    }

    fn decode(&self, bytes: &[u8]) -> Result<ResourceTable> {
        let table: ResourceTable = serde_json::from_slice(bytes)?;
        table.validate()?;
        Ok(table)
    }

    fn encode(&self, table: &ResourceTable) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(table)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::sample_table;
    use crate::GuardError;

    #[test]
    fn test_json_codec_preserves_table() {
        let codec = JsonTableCodec;
        let table = sample_table();
        let bytes = codec.encode(&table).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), table);
    }

    #[test]
    fn test_decode_rejects_invalid_tables() {
        let codec = JsonTableCodec;
        assert!(matches!(
            codec.decode(b"{\"packages\": 3}"),
            Err(GuardError::Serialization(_))
        ));

        let mut table = sample_table();
        let dup = table.packages[0].types[1].entries[0].clone();
        table.packages[0].types[1].entries.push(dup);
        let bytes = serde_json::to_vec(&table).unwrap();
        assert!(matches!(codec.decode(&bytes), Err(GuardError::Integrity(_))));
    }

    #[test]
    fn test_value_kinds_are_tagged() {
        let json = r#"{"packages":[{"id":127,"name":"com.app","types":[{"id":1,"name":"string",
            "entries":[{"name":"title","config_values":[
                {"config":{"locale":"fr"},"value":{"kind":"str","value":"Titre"}}]}]}]}]}"#;
        let table = JsonTableCodec.decode(json.as_bytes()).unwrap();
        let entry = &table.packages[0].types[0].entries[0];
        assert_eq!(entry.id, None);
        assert_eq!(entry.config_values[0].config.locale, "fr");
    }
}
