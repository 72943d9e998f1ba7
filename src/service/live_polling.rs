//! Background polling of a [`MessageSource`] into an [`Aggregator`].

use crate::chat_management::Aggregator;
use crate::source::{MessageSource, SourceError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Exponential backoff applied after transient fetch failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            multiplier: 2.0,
            max_delay: Duration::from_millis(30000),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt after `consecutive_failures` failures in
    /// a row (1 for the first failure)
    pub fn delay_for(&self, consecutive_failures: u32) -> Duration {
        let exponent = consecutive_failures.saturating_sub(1).min(32) as i32;
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let max_ms = self.max_delay.as_millis() as f64;

        Duration::from_millis(delay_ms.min(max_ms).max(0.0) as u64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollingOptions {
    /// Lower bound for the delay between successful fetches
    pub min_interval: Duration,
    pub retry: RetryPolicy,
    /// Give up after this many transient failures in a row; `None` retries
    /// until stopped
    pub max_consecutive_failures: Option<u32>,
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(2000),
            retry: RetryPolicy::default(),
            max_consecutive_failures: None,
        }
    }
}

/// Why the polling task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Stop was requested
    Stopped,
    /// The source reported the end of the stream
    StreamEnded,
    /// The consecutive failure bound was hit; carries the last error
    TooManyFailures(SourceError),
    /// A non-retryable error
    Fatal(SourceError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingSummary {
    /// Successful fetches
    pub batches: usize,
    /// Messages handed to the aggregator
    pub messages: usize,
    /// Failed fetches
    pub failures: usize,
    pub end_reason: EndReason,
}

/// Handle to a running polling task.
///
/// Cancellation is cooperative: [`stop`](Self::stop) is observed between
/// fetches and while sleeping, never in the middle of a fetch, so a page
/// that was already received is always ingested.
pub struct LivePollingService {
    stop_sender: watch::Sender<bool>,
    handle: JoinHandle<PollingSummary>,
}

impl LivePollingService {
    /// Spawn the polling task on the current tokio runtime
    pub fn start(source: MessageSource, aggregator: Arc<Aggregator>, options: PollingOptions) -> Self {
        let (stop_sender, stop_receiver) = watch::channel(false);
        let handle = tokio::spawn(run_polling(source, aggregator, options, stop_receiver));

        Self {
            stop_sender,
            handle,
        }
    }

    /// Ask the task to stop after the current fetch
    pub fn stop(&self) {
        let _ = self.stop_sender.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to end
    pub async fn join(self) -> Result<PollingSummary, tokio::task::JoinError> {
        self.handle.await
    }

    /// Request a stop and wait for the task to end
    pub async fn shutdown(self) -> Result<PollingSummary, tokio::task::JoinError> {
        self.stop();
        self.join().await
    }
}

async fn run_polling(
    mut source: MessageSource,
    aggregator: Arc<Aggregator>,
    options: PollingOptions,
    mut stop_receiver: watch::Receiver<bool>,
) -> PollingSummary {
    let mode = source.mode();
    let mut batches = 0;
    let mut messages = 0;
    let mut failures = 0;
    let mut consecutive_failures = 0u32;

    tracing::info!(%mode, "🚀 Polling task started");

    let end_reason = loop {
        if *stop_receiver.borrow() {
            break EndReason::Stopped;
        }

        let delay = match source.next_batch().await {
            Ok(batch) => {
                consecutive_failures = 0;
                batches += 1;
                messages += aggregator.ingest_batch(&batch.messages);

                tracing::debug!(
                    batch = batches,
                    received = batch.messages.len(),
                    total = messages,
                    "📬 Batch ingested"
                );

                if batch.is_end() {
                    break EndReason::StreamEnded;
                }
                batch
                    .polling_interval
                    .unwrap_or_default()
                    .max(options.min_interval)
            }
            Err(error) if error.is_transient() => {
                failures += 1;
                consecutive_failures += 1;

                if options
                    .max_consecutive_failures
                    .is_some_and(|max| consecutive_failures >= max)
                {
                    tracing::error!(
                        consecutive_failures,
                        error = %error,
                        "❌ Too many consecutive failures, giving up"
                    );
                    break EndReason::TooManyFailures(error);
                }

                let delay = options.retry.delay_for(consecutive_failures);
                tracing::warn!(
                    consecutive_failures,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %error,
                    "⚠️ Fetch failed, backing off"
                );
                delay
            }
            Err(error) => {
                tracing::error!(error = %error, "❌ Fetch failed permanently");
                break EndReason::Fatal(error);
            }
        };

        let stop_changed = tokio::select! {
            _ = tokio::time::sleep(delay) => None,
            changed = stop_receiver.changed() => Some(changed.is_ok()),
        };
        if stop_changed == Some(false) {
            // every handle is gone, nobody can stop us later
            break EndReason::Stopped;
        }
    };

    tracing::info!(
        batches,
        messages,
        failures,
        end_reason = ?end_reason,
        "🛑 Polling task finished"
    );

    PollingSummary {
        batches,
        messages,
        failures,
        end_reason,
    }
}
