use anyhow::{Context, Result};
use chatdraw::{
    api::innertube::InnerTubeTransport,
    api::youtube::{parse_video_id, watch_url},
    config::{AppConfig, ConfigManager, ExportPaths},
    export::{CsvExporter, ExportFormat, ExportManager},
    io::{import_file, RawResponseRecorder},
    logging::init_logging,
    models::SourceMode,
    service::{EndReason, LivePollingService, PollingSummary},
    session::{DrawResult, GiveawaySession},
    source::{LivePollingSource, MessageSource},
};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// ポーリングタスクの終了確認間隔
const CHECK_INTERVAL: Duration = Duration::from_secs(1);
/// 状態ログを出すまでの確認回数
const STATUS_EVERY_CHECKS: u32 = 10;

#[derive(Parser, Debug)]
#[command(author, version, about = "Draw giveaway winners from YouTube live chat or a saved chat log", long_about = None)]
struct Cli {
    /// Config file (defaults to config.toml in the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a chat log (.txt, .csv, .ndjson/.jsonl) and draw winners
    Import {
        /// Chat log file
        file: PathBuf,

        #[command(flatten)]
        draw: DrawArgs,
    },
    /// Poll a live chat until Ctrl+C, the end of the stream or --duration, then draw winners
    Live {
        /// Watch URL or video ID
        url: String,

        /// Stop polling after this many seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Append raw responses to this NDJSON file
        #[arg(long)]
        record: Option<PathBuf>,

        #[command(flatten)]
        draw: DrawArgs,
    },
}

/// Overrides for the `[giveaway]` and `[export]` config sections
#[derive(Args, Debug, Clone, Default)]
struct DrawArgs {
    /// Keyword that must appear in at least one message
    #[arg(long)]
    keyword: Option<String>,

    /// Match the keyword case-sensitively
    #[arg(long = "case-sensitive")]
    case_sensitive: bool,

    /// Minimum number of messages to be eligible
    #[arg(long = "min-messages", allow_hyphen_values = true)]
    min_messages: Option<i64>,

    /// Usernames or channel IDs to exclude (comma separated or repeated)
    #[arg(long, value_delimiter = ',')]
    blacklist: Vec<String>,

    /// Number of winners to draw
    #[arg(long, allow_hyphen_values = true)]
    winners: Option<i64>,

    /// Weight each participant by message count
    #[arg(long)]
    weighted: bool,

    /// Seed for a reproducible draw
    #[arg(long)]
    seed: Option<u64>,

    /// Video ID recorded in the audit export
    #[arg(long = "video-id")]
    video_id: Option<String>,

    /// Audit export path (defaults to a timestamped file in the output directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Audit export format
    #[arg(long, value_enum)]
    format: Option<ExportFormat>,

    /// Also write a winners-only CSV
    #[arg(long = "winners-csv")]
    winners_csv: bool,
}

impl DrawArgs {
    fn apply_to(&self, config: &mut AppConfig) {
        let giveaway = &mut config.giveaway;
        if let Some(keyword) = &self.keyword {
            giveaway.keyword = Some(keyword.clone());
        }
        if self.case_sensitive {
            giveaway.case_sensitive = true;
        }
        if let Some(min_messages) = self.min_messages {
            giveaway.min_messages = min_messages;
        }
        giveaway.blacklist.extend(self.blacklist.iter().cloned());
        if let Some(winners) = self.winners {
            giveaway.winner_count = winners;
        }
        if self.weighted {
            giveaway.weighted = true;
        }
        if self.seed.is_some() {
            giveaway.seed = self.seed;
        }

        if let Some(format) = self.format {
            config.export.format = format;
        }
        if self.winners_csv {
            config.export.write_winners_csv = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let mut config = config_manager.load_config()?;

    let _log_guard = init_logging(&config.log)?;
    tracing::info!("🎬 Starting chatdraw");

    let draw = match &cli.command {
        Command::Import { draw, .. } | Command::Live { draw, .. } => draw,
    };
    draw.apply_to(&mut config);

    // 収集を始める前に失敗させる
    config
        .giveaway
        .validate()
        .context("Invalid giveaway settings")?;
    let export_paths = config
        .export
        .resolve_paths(draw.output.as_deref(), Local::now())
        .context("Invalid export destination")?;

    let session = match &cli.command {
        Command::Import { file, draw } => run_import(file, draw, &config).await?,
        Command::Live {
            url,
            duration,
            record,
            draw,
        } => {
            let record = record.clone().or_else(|| config.polling.raw_response_file.clone());
            run_live(
                url,
                duration.map(Duration::from_secs),
                record,
                draw,
                &config,
            )
            .await?
        }
    };

    let result = session
        .draw(
            &config.giveaway.filter_config(),
            &config.giveaway.selection_config(),
        )
        .context("Invalid giveaway settings")?;

    print_winners(&result);
    write_exports(&result, &export_paths, &config)?;

    tracing::info!("👋 chatdraw finished");
    Ok(())
}

/// チャットログを読み込み、セッションに集計する
async fn run_import(
    file: &Path,
    draw: &DrawArgs,
    config: &AppConfig,
) -> Result<GiveawaySession> {
    let report = import_file(file).with_context(|| format!("Failed to import {}", file.display()))?;
    if report.skipped > 0 {
        tracing::warn!(skipped = report.skipped, "⚠️ Malformed rows skipped");
    }

    let session = GiveawaySession::new(SourceMode::Offline, draw.video_id.clone());
    let service = LivePollingService::start(
        MessageSource::offline(report.messages),
        Arc::clone(session.aggregator()),
        config.polling.polling_options(),
    );
    log_summary(&service.join().await?);

    Ok(session)
}

/// ライブチャットを停止条件まで取得し続ける
async fn run_live(
    url: &str,
    duration: Option<Duration>,
    record: Option<PathBuf>,
    draw: &DrawArgs,
    config: &AppConfig,
) -> Result<GiveawaySession> {
    let video_id =
        parse_video_id(url).with_context(|| format!("Not a YouTube video URL or ID: {url}"))?;

    let (mut transport, continuation) = InnerTubeTransport::connect(&watch_url(&video_id))
        .await
        .with_context(|| format!("Failed to open live chat for {video_id}"))?;
    if transport.is_replay() {
        tracing::info!("📼 {} is a replay, collecting its archived chat", video_id);
    }
    if let Some(path) = record {
        tracing::info!(path = %path.display(), "💾 Recording raw responses");
        transport = transport.with_recorder(RawResponseRecorder::new(path));
    }

    let session_video_id = draw
        .video_id
        .clone()
        .unwrap_or_else(|| transport.video_id().to_string());
    let session = GiveawaySession::new(SourceMode::Live, Some(session_video_id));

    let source = LivePollingSource::new(Box::new(transport), continuation.0)
        .with_fetch_timeout(config.polling.fetch_timeout());
    let service = LivePollingService::start(
        MessageSource::LivePolling(source),
        Arc::clone(session.aggregator()),
        config.polling.polling_options(),
    );

    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut check = tokio::time::interval(CHECK_INTERVAL);
    check.tick().await;
    let mut checks = 0u32;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("🛑 Ctrl+C received, stopping");
                break;
            }
            _ = &mut deadline => {
                tracing::info!("⏰ Duration elapsed, stopping");
                break;
            }
            _ = check.tick() => {
                if service.is_finished() {
                    break;
                }
                checks += 1;
                if checks % STATUS_EVERY_CHECKS != 0 {
                    continue;
                }
                let stats = session.aggregator().stats();
                tracing::info!(
                    participants = stats.participants,
                    messages = stats.total_messages,
                    "📊 Collecting"
                );
            }
        }
    }

    log_summary(&service.shutdown().await?);
    Ok(session)
}

fn log_summary(summary: &PollingSummary) {
    match &summary.end_reason {
        EndReason::Fatal(error) | EndReason::TooManyFailures(error) => tracing::warn!(
            batches = summary.batches,
            messages = summary.messages,
            failures = summary.failures,
            error = %error,
            "⚠️ Polling ended early, drawing from what was collected"
        ),
        reason => tracing::info!(
            batches = summary.batches,
            messages = summary.messages,
            failures = summary.failures,
            end_reason = ?reason,
            "✅ Collection finished"
        ),
    }
}

fn print_winners(result: &DrawResult) {
    for rejected in result.eligibility.iter().filter(|r| !r.eligible) {
        tracing::debug!(identity = %rejected.identity, reasons = ?rejected.reasons(), "Not eligible");
    }

    let winners = result.export.winners();
    if winners.is_empty() {
        println!(
            "No winners: {} of {} participants eligible",
            result.eligible_count(),
            result.snapshot.len()
        );
        return;
    }

    println!(
        "🏆 Winners ({} drawn from {} eligible of {} participants)",
        winners.len(),
        result.eligible_count(),
        result.snapshot.len()
    );
    for winner in winners {
        println!(
            "{:>3}. {} ({} messages)",
            winner.draw_order.unwrap_or_default(),
            winner.display_name,
            winner.message_count
        );
    }
}

fn write_exports(result: &DrawResult, paths: &ExportPaths, config: &AppConfig) -> Result<()> {
    ExportManager::new()
        .write_to_file(&paths.audit, &result.export, config.export.format)
        .with_context(|| format!("Failed to write {}", paths.audit.display()))?;
    println!("Audit export: {}", paths.audit.display());

    if let Some(winners_path) = &paths.winners {
        std::fs::write(winners_path, CsvExporter::new().export_winners(&result.export))
            .with_context(|| format!("Failed to write {}", winners_path.display()))?;
        println!("Winners export: {}", winners_path.display());
    }

    Ok(())
}
