use super::{AuditExport, ExportError, FormatHandler};

/// JSON形式エクスポーター
///
/// `{ "metadata": {...}, "records": [...] }` を出力する。
pub struct JsonExporter {
    pretty_print: bool,
}

impl JsonExporter {
    pub fn new() -> Self {
        Self { pretty_print: true }
    }

    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }
}

impl FormatHandler for JsonExporter {
    fn export(&self, data: &AuditExport) -> Result<Vec<u8>, ExportError> {
        let json_bytes = if self.pretty_print {
            serde_json::to_vec_pretty(data)
        } else {
            serde_json::to_vec(data)
        }
        .map_err(|e| ExportError::Serialization(e.to_string()))?;

        Ok(json_bytes)
    }

    fn file_extension(&self) -> &str {
        "json"
    }
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::sample_export;

    #[test]
    fn test_json_export_structure() {
        let bytes = JsonExporter::new().export(&sample_export()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(json["metadata"]["session_id"], "session-1");
        assert_eq!(json["metadata"]["mode"], "live");
        assert_eq!(json["metadata"]["seed"], 42);

        let records = json["records"].as_array().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["timestamp_iso"], "2024-05-01T12:00:00Z");
        assert_eq!(records[0]["draw_order"], 2);
        assert!(records[1]["draw_order"].is_null());
        assert_eq!(records[1]["selected_as_winner"], false);
    }

    #[test]
    fn test_compact_output() {
        let pretty = JsonExporter::new().export(&sample_export()).unwrap();
        let compact = JsonExporter::new()
            .with_pretty_print(false)
            .export(&sample_export())
            .unwrap();

        assert!(compact.len() < pretty.len());
        assert!(!compact.contains(&b'\n'));
    }
}
