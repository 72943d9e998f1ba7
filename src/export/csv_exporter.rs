use super::{AuditExport, ExportError, FormatHandler};
use crate::models::AuditRecord;
use chrono::{DateTime, SecondsFormat, Utc};

/// 監査CSVの列（順序固定）
pub const AUDIT_COLUMNS: [&str; 11] = [
    "timestamp_iso",
    "youtube_video_id",
    "mode",
    "username",
    "message_count",
    "first_seen",
    "keyword_used",
    "blacklisted",
    "eligible",
    "selected_as_winner",
    "draw_order",
];

/// 当選者CSVの列
pub const WINNER_COLUMNS: [&str; 6] = [
    "timestamp_iso",
    "youtube_video_id",
    "mode",
    "username",
    "draw_order",
    "selected_as_winner",
];

/// CSV形式エクスポーター
pub struct CsvExporter {
    delimiter: char,
    include_headers: bool,
}

impl CsvExporter {
    pub fn new() -> Self {
        Self {
            delimiter: ',',
            include_headers: true,
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_headers(mut self, include_headers: bool) -> Self {
        self.include_headers = include_headers;
        self
    }

    /// CSVフィールドをエスケープ
    fn escape_csv_field(&self, field: &str) -> String {
        if field.contains(self.delimiter)
            || field.contains('"')
            || field.contains('\n')
            || field.contains('\r')
        {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    fn join(&self, fields: &[String]) -> String {
        fields.join(&self.delimiter.to_string())
    }

    fn header_line(&self, columns: &[&str]) -> String {
        columns.join(&self.delimiter.to_string())
    }

    /// レコードをCSV行に変換
    fn record_to_csv_row(&self, record: &AuditRecord) -> String {
        self.join(&[
            format_timestamp(&record.timestamp),
            self.escape_csv_field(record.youtube_video_id.as_deref().unwrap_or("")),
            record.mode.to_string(),
            self.escape_csv_field(&record.display_name),
            record.message_count.to_string(),
            format_timestamp(&record.first_seen),
            format_bool(record.keyword_used).to_string(),
            format_bool(record.blacklisted).to_string(),
            format_bool(record.eligible).to_string(),
            format_bool(record.selected_as_winner).to_string(),
            record
                .draw_order
                .map_or(String::new(), |order| order.to_string()),
        ])
    }

    fn write_lines<I>(&self, columns: &[&str], rows: I) -> Vec<u8>
    where
        I: IntoIterator<Item = String>,
    {
        let mut csv_content = Vec::new();

        if self.include_headers {
            csv_content.extend_from_slice(self.header_line(columns).as_bytes());
            csv_content.push(b'\n');
        }

        for row in rows {
            csv_content.extend_from_slice(row.as_bytes());
            csv_content.push(b'\n');
        }

        csv_content
    }

    /// 当選者のみのCSV（抽選順）
    pub fn export_winners(&self, data: &AuditExport) -> Vec<u8> {
        let rows = data.winners().into_iter().map(|record| {
            self.join(&[
                format_timestamp(&record.timestamp),
                self.escape_csv_field(record.youtube_video_id.as_deref().unwrap_or("")),
                record.mode.to_string(),
                self.escape_csv_field(&record.display_name),
                record
                    .draw_order
                    .map_or(String::new(), |order| order.to_string()),
                format_bool(true).to_string(),
            ])
        });

        self.write_lines(&WINNER_COLUMNS, rows)
    }
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

impl FormatHandler for CsvExporter {
    fn export(&self, data: &AuditExport) -> Result<Vec<u8>, ExportError> {
        let rows = data.records.iter().map(|r| self.record_to_csv_row(r));
        Ok(self.write_lines(&AUDIT_COLUMNS, rows))
    }

    fn file_extension(&self) -> &str {
        "csv"
    }
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::sample_export;

    fn export_lines(exporter: &CsvExporter) -> Vec<String> {
        let bytes = exporter.export(&sample_export()).unwrap();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_csv_header_is_fixed() {
        let lines = export_lines(&CsvExporter::new());
        assert_eq!(
            lines[0],
            "timestamp_iso,youtube_video_id,mode,username,message_count,first_seen,keyword_used,blacklisted,eligible,selected_as_winner,draw_order"
        );
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_csv_rows() {
        let lines = export_lines(&CsvExporter::new());
        assert_eq!(
            lines[1],
            "2024-05-01T12:00:00Z,dQw4w9WgXcQ,live,Alice,3,2024-05-01T12:00:00Z,True,False,True,True,2"
        );
        assert_eq!(
            lines[2],
            "2024-05-01T12:00:00Z,dQw4w9WgXcQ,live,\"Bob, \"\"the\"\" builder\",3,2024-05-01T12:00:00Z,True,False,True,False,"
        );
    }

    #[test]
    fn test_csv_without_headers_and_custom_delimiter() {
        let lines = export_lines(&CsvExporter::new().with_headers(false).with_delimiter(';'));
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("2024-05-01T12:00:00Z;dQw4w9WgXcQ;live;Alice;3;"));
        assert!(lines[1].contains(";\"Bob, \"\"the\"\" builder\";"));
    }

    #[test]
    fn test_escape_csv_field() {
        let exporter = CsvExporter::new();
        assert_eq!(exporter.escape_csv_field("plain"), "plain");
        assert_eq!(exporter.escape_csv_field("a,b"), "\"a,b\"");
        assert_eq!(exporter.escape_csv_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn test_winners_csv() {
        let bytes = CsvExporter::new().export_winners(&sample_export());
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(
            lines[0],
            "timestamp_iso,youtube_video_id,mode,username,draw_order,selected_as_winner"
        );
        assert_eq!(lines[1], "2024-05-01T12:00:00Z,dQw4w9WgXcQ,live,Carol,1,True");
        assert_eq!(lines[2], "2024-05-01T12:00:00Z,dQw4w9WgXcQ,live,Alice,2,True");
        assert_eq!(lines.len(), 3);
    }
}
