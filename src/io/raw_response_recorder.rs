//! ライブチャット生レスポンスのNDJSON記録
//!
//! 記録したファイルは `chatdraw import` でオフライン再生できる。

use crate::api::innertube::get_live_chat::{GetLiveChatResponse, ResponseEntry};
use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// 生レスポンスをNDJSONで追記する
#[derive(Debug, Clone)]
pub struct RawResponseRecorder {
    path: PathBuf,
    /// 超えたらローテーションするサイズ(MB)。0 でローテーションなし
    max_file_size_mb: u64,
}

impl RawResponseRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_file_size_mb: 100,
        }
    }

    pub fn with_max_file_size_mb(mut self, max_file_size_mb: u64) -> Self {
        self.max_file_size_mb = max_file_size_mb;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// レスポンスを1行追記
    pub fn record(&self, response: &GetLiveChatResponse) -> Result<()> {
        self.rotate_if_needed()?;

        let entry = ResponseEntry {
            timestamp: Utc::now().timestamp() as u64,
            response: response.clone(),
        };
        let json_line =
            serde_json::to_string(&entry).context("Failed to serialize response to JSON")?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        writeln!(file, "{}", json_line)?;
        file.flush()?;

        tracing::debug!(
            path = %self.path.display(),
            bytes = json_line.len(),
            "💾 Raw response recorded"
        );
        Ok(())
    }

    fn rotate_if_needed(&self) -> Result<()> {
        if self.max_file_size_mb == 0 {
            return Ok(());
        }
        let Ok(metadata) = std::fs::metadata(&self.path) else {
            return Ok(());
        };
        if metadata.len() / 1024 / 1024 < self.max_file_size_mb {
            return Ok(());
        }

        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("raw_responses");
        let ext = self
            .path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("ndjson");
        let rotated = self.path.with_file_name(format!(
            "{}_{}.{}",
            stem,
            Utc::now().format("%Y%m%d_%H%M%S"),
            ext
        ));

        std::fs::rename(&self.path, &rotated).context("Failed to rotate file")?;
        tracing::info!(
            "🔁 Recording rotated: {} -> {}",
            self.path.display(),
            rotated.display()
        );
        Ok(())
    }

    /// 記録済みレスポンス数
    pub fn recorded_count(&self) -> Result<usize> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().filter(|l| !l.trim().is_empty()).count()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}
