pub mod live_polling;

pub use live_polling::{EndReason, LivePollingService, PollingOptions, PollingSummary, RetryPolicy};
