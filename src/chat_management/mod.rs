pub mod aggregator;
pub mod participant_filter;
pub mod winner_selector;

pub use aggregator::*;
pub use participant_filter::*;
pub use winner_selector::*;

/// 抽選設定の検証エラー
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("min_messages must not be negative (got {0})")]
    NegativeMinMessages(i64),

    #[error("winner_count must not be negative (got {0})")]
    NegativeWinnerCount(i64),
}
