//! ログ初期化

use crate::config::{default_log_dir, LogConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// tracing購読者を初期化する
///
/// `RUST_LOG` が設定されていればそれを優先し、なければ `config.log_level`。
/// ファイル出力が有効な場合は日次ローテーションのファイルにも書き出し、
/// バッファを flush するためのガードを返す（呼び出し側で保持すること）。
pub fn init_logging(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .or_else(|_| EnvFilter::try_new("info"))?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let log_dir = config.log_dir.clone().or_else(default_log_dir);
    let (file_layer, guard) = match (config.enable_file_logging, log_dir) {
        (true, Some(dir)) => {
            std::fs::create_dir_all(&dir)?;
            let appender = tracing_appender::rolling::daily(&dir, "chatdraw.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    if guard.is_some() {
        tracing::debug!("📝 File logging enabled");
    }

    Ok(guard)
}
