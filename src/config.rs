//! アプリケーション設定管理モジュール
//!
//! XDGディレクトリの `config.toml` を読み書きする。ファイルが無ければ既定値。

use crate::chat_management::{ConfigurationError, FilterConfig, FilterPipeline, SelectionConfig};
use crate::export::{create_export_filename, validate_export_path, ExportError, ExportFormat};
use crate::service::{PollingOptions, RetryPolicy};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// 抽選設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GiveawayConfig {
    pub keyword: Option<String>,
    pub case_sensitive: bool,
    pub min_messages: i64,
    pub blacklist: BTreeSet<String>,
    pub winner_count: i64,
    pub weighted: bool,
    pub seed: Option<u64>,
}

impl Default for GiveawayConfig {
    fn default() -> Self {
        Self {
            keyword: None,
            case_sensitive: false,
            min_messages: 1,
            blacklist: BTreeSet::new(),
            winner_count: 1,
            weighted: false,
            seed: None,
        }
    }
}

impl GiveawayConfig {
    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            keyword: self.keyword.clone(),
            case_sensitive: self.case_sensitive,
            min_messages: self.min_messages,
            blacklist: self.blacklist.clone(),
        }
    }

    pub fn selection_config(&self) -> SelectionConfig {
        SelectionConfig {
            winner_count: self.winner_count,
            weighted: self.weighted,
            seed: self.seed,
        }
    }

    /// 収集を始める前に抽選設定を検証する
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        FilterPipeline::new(&self.filter_config())?;
        self.selection_config().validate()?;
        Ok(())
    }
}

/// ライブチャット取得設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// 取得間隔の下限(ms)。配信側の指定間隔の方が長ければそちらを使う
    pub min_interval_ms: u64,
    /// 1回の取得のタイムアウト(秒)
    pub fetch_timeout_secs: u64,
    /// リトライ初期待機時間(ms)
    pub initial_delay_ms: u64,
    /// 指数バックオフの倍率
    pub backoff_multiplier: f64,
    /// 最大待機時間(ms)
    pub max_delay_ms: u64,
    /// 連続失敗の上限。None なら停止するまで再試行
    pub max_consecutive_failures: Option<u32>,
    /// 生レスポンスの記録先（NDJSON）
    pub raw_response_file: Option<PathBuf>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 2000,
            fetch_timeout_secs: 15,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 30000,
            max_consecutive_failures: None,
            raw_response_file: None,
        }
    }
}

impl PollingConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn polling_options(&self) -> PollingOptions {
        PollingOptions {
            min_interval: Duration::from_millis(self.min_interval_ms),
            retry: RetryPolicy {
                initial_delay: Duration::from_millis(self.initial_delay_ms),
                multiplier: self.backoff_multiplier,
                max_delay: Duration::from_millis(self.max_delay_ms),
            },
            max_consecutive_failures: self.max_consecutive_failures,
        }
    }
}

/// 出力設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// 出力ディレクトリ
    pub output_dir: PathBuf,
    /// ファイル名の接頭辞
    pub base_name: String,
    pub format: ExportFormat,
    /// 当選者のみのCSVも出力する
    pub write_winners_csv: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            base_name: "giveaway".to_string(),
            format: ExportFormat::Csv,
            write_winners_csv: false,
        }
    }
}

/// 出力ファイルの書き込み先
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub audit: PathBuf,
    /// `write_winners_csv` が有効な場合のみ
    pub winners: Option<PathBuf>,
}

impl ExportSettings {
    /// 出力先を決めて検証する。`audit_override` があれば監査ファイルはそのパス
    pub fn resolve_paths(
        &self,
        audit_override: Option<&Path>,
        now: DateTime<Local>,
    ) -> Result<ExportPaths, ExportError> {
        let audit = match audit_override {
            Some(path) => path.to_path_buf(),
            None => self.output_dir.join(create_export_filename(
                &self.base_name,
                "audit",
                self.format,
                now,
            )),
        };
        validate_export_path(&audit)?;

        let winners = if self.write_winners_csv {
            let path = self.output_dir.join(create_export_filename(
                &self.base_name,
                "winners",
                ExportFormat::Csv,
                now,
            ));
            validate_export_path(&path)?;
            Some(path)
        } else {
            None
        };

        Ok(ExportPaths { audit, winners })
    }
}

/// ログ設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// カスタムログディレクトリ（Noneの場合はXDGデフォルト使用）
    pub log_dir: Option<PathBuf>,
    /// ログレベル (trace/debug/info/warn/error)
    pub log_level: String,
    /// ファイル出力有効化
    pub enable_file_logging: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            log_level: "info".to_string(),
            enable_file_logging: false,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub giveaway: GiveawayConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub log: LogConfig,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "sifyfy", "chatdraw")
}

/// XDGデータディレクトリ配下のログディレクトリ
pub fn default_log_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_local_dir().join("logs"))
}

/// 設定管理マネージャー
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// XDG設定ディレクトリの `config.toml` を使う
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Ok(Self { config_path })
    }

    /// 任意のパスを使う
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// XDGディレクトリに基づく設定ファイルパスを取得
    fn get_config_path() -> Result<PathBuf> {
        let project_dirs = project_dirs().context("Failed to get project directories")?;
        let config_file = project_dirs.config_dir().join("config.toml");

        debug!("Config file path: {}", config_file.display());

        Ok(config_file)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 設定を読み込み
    pub fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!(
                "Config file not found, using default settings: {}",
                self.config_path.display()
            );
            return Ok(AppConfig::default());
        }

        let config_content = fs::read_to_string(&self.config_path).with_context(|| {
            format!("Failed to read config file: {}", self.config_path.display())
        })?;

        let config: AppConfig = toml::from_str(&config_content).with_context(|| {
            format!(
                "Failed to parse config file: {}",
                self.config_path.display()
            )
        })?;

        info!(
            "✅ Configuration loaded from: {}",
            self.config_path.display()
        );

        Ok(config)
    }

    /// 設定を保存
    pub fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let config_content =
            toml::to_string_pretty(config).context("Failed to serialize config")?;

        fs::write(&self.config_path, config_content).with_context(|| {
            format!(
                "Failed to write config file: {}",
                self.config_path.display()
            )
        })?;

        info!("💾 Configuration saved to: {}", self.config_path.display());

        Ok(())
    }
}
