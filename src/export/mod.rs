use crate::chat_management::FilterSummary;
use crate::models::{AuditRecord, SourceMode};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod audit;
pub mod csv_exporter;
pub mod json_exporter;

pub use audit::AuditExporter;
pub use csv_exporter::CsvExporter;
pub use json_exporter::JsonExporter;

/// エクスポート形式
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn file_extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// エクスポートエラー
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unsupported format: {format:?}")]
    UnsupportedFormat { format: ExportFormat },

    #[error("Invalid export path {path}: {reason}")]
    InvalidPath { path: String, reason: String },
}

/// 抽選全体の情報（JSON出力のメタデータ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawMetadata {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub exported_at: DateTime<Utc>,
    pub mode: SourceMode,
    pub youtube_video_id: Option<String>,
    pub filters: Option<FilterSummary>,
    pub weighted: bool,
    pub seed: Option<u64>,
    pub requested_winners: usize,
    pub eligible_count: usize,
    pub total_participants: usize,
}

/// エクスポート対象データ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditExport {
    pub metadata: DrawMetadata,
    pub records: Vec<AuditRecord>,
}

impl AuditExport {
    /// 当選者のレコードを抽選順に返す
    pub fn winners(&self) -> Vec<&AuditRecord> {
        let mut winners: Vec<&AuditRecord> =
            self.records.iter().filter(|r| r.selected_as_winner).collect();
        winners.sort_by_key(|r| r.draw_order);
        winners
    }
}

/// フォーマットハンドラートレイト
pub trait FormatHandler: Send + Sync {
    fn export(&self, data: &AuditExport) -> Result<Vec<u8>, ExportError>;
    fn file_extension(&self) -> &str;
}

/// エクスポートマネージャー
pub struct ExportManager {
    format_handlers: HashMap<ExportFormat, Box<dyn FormatHandler>>,
}

impl ExportManager {
    /// 新しいエクスポートマネージャーを作成
    pub fn new() -> Self {
        let mut manager = Self {
            format_handlers: HashMap::new(),
        };

        // デフォルトハンドラーを登録
        manager.register_handler(ExportFormat::Csv, Box::new(CsvExporter::new()));
        manager.register_handler(ExportFormat::Json, Box::new(JsonExporter::new()));

        manager
    }

    /// フォーマットハンドラーを登録
    pub fn register_handler(&mut self, format: ExportFormat, handler: Box<dyn FormatHandler>) {
        self.format_handlers.insert(format, handler);
    }

    /// データをエクスポート
    pub fn export(&self, data: &AuditExport, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
        let handler = self
            .format_handlers
            .get(&format)
            .ok_or(ExportError::UnsupportedFormat { format })?;

        handler.export(data)
    }

    /// ファイルに書き出す
    pub fn write_to_file(
        &self,
        path: &Path,
        data: &AuditExport,
        format: ExportFormat,
    ) -> Result<(), ExportError> {
        validate_export_path(path)?;
        let bytes = self.export(data, format)?;
        std::fs::write(path, bytes)?;

        tracing::info!(
            path = %path.display(),
            format = ?format,
            records = data.records.len(),
            "📤 Audit export written"
        );
        Ok(())
    }
}

impl Default for ExportManager {
    fn default() -> Self {
        Self::new()
    }
}

/// タイムスタンプ付きのファイル名 `{base}_{kind}_{YYYYmmdd_HHMMSS}.{ext}`
pub fn create_export_filename(
    base_name: &str,
    export_type: &str,
    format: ExportFormat,
    now: DateTime<Local>,
) -> String {
    format!(
        "{}_{}_{}.{}",
        base_name,
        export_type,
        now.format("%Y%m%d_%H%M%S"),
        format.file_extension()
    )
}

/// 出力先ディレクトリが存在し書き込み可能か確認
pub fn validate_export_path(path: &Path) -> Result<(), ExportError> {
    let invalid = |reason: String| ExportError::InvalidPath {
        path: path.display().to_string(),
        reason,
    };

    if path.is_dir() {
        return Err(invalid("path is a directory".to_string()));
    }

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !parent.is_dir() {
        return Err(invalid(format!(
            "directory does not exist: {}",
            parent.display()
        )));
    }

    let metadata = std::fs::metadata(&parent)?;
    if metadata.permissions().readonly() {
        return Err(invalid(format!(
            "no write permission for directory: {}",
            parent.display()
        )));
    }

    Ok(())
}
