//! ライブポーリングのテスト
//!
//! 偽の `ChatTransport` を使い、停止・再試行・終端の扱いを確認する。

use async_trait::async_trait;
use chatdraw::{
    api::innertube::get_live_chat::GetLiveChatResponse,
    chat_management::Aggregator,
    models::ChatMessage,
    service::{EndReason, LivePollingService, PollingOptions, RetryPolicy},
    source::{ChatPage, ChatTransport, MessageSource, SourceError},
};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 台本どおりに応答する転送層。台本が尽きたら空ページを返し続ける
struct FakeTransport {
    script: Mutex<VecDeque<Result<ChatPage, SourceError>>>,
    latency: Duration,
    calls: AtomicUsize,
    seen_continuations: Mutex<Vec<String>>,
}

impl FakeTransport {
    fn new(script: Vec<Result<ChatPage, SourceError>>) -> Arc<Self> {
        Self::with_latency(script, Duration::ZERO)
    }

    fn with_latency(script: Vec<Result<ChatPage, SourceError>>, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            latency,
            calls: AtomicUsize::new(0),
            seen_continuations: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn fetch_page(&self, continuation: &str) -> Result<ChatPage, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_continuations.lock().push(continuation.to_string());
        tokio::time::sleep(self.latency).await;

        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| {
            Ok(ChatPage {
                messages: vec![],
                continuation: Some(continuation.to_string()),
                polling_interval: None,
            })
        })
    }
}

fn page(authors: &[&str], next: Option<&str>) -> Result<ChatPage, SourceError> {
    Ok(ChatPage {
        messages: authors
            .iter()
            .map(|author| ChatMessage::new(*author, *author, "giveaway", Utc::now()))
            .collect(),
        continuation: next.map(str::to_string),
        polling_interval: Some(Duration::from_millis(1)),
    })
}

fn options() -> PollingOptions {
    PollingOptions {
        min_interval: Duration::from_millis(1),
        retry: RetryPolicy {
            initial_delay: Duration::from_millis(2),
            multiplier: 2.0,
            max_delay: Duration::from_millis(10),
        },
        max_consecutive_failures: None,
    }
}

#[cfg(test)]
mod termination_tests {
    use super::*;

    #[tokio::test]
    async fn test_end_of_stream_terminates() {
        let transport = FakeTransport::new(vec![
            page(&["alice", "bob"], Some("c2")),
            page(&["alice"], Some("c3")),
            page(&["carol"], None),
        ]);
        let aggregator = Arc::new(Aggregator::new());

        let summary = LivePollingService::start(
            MessageSource::live(Box::new(Arc::clone(&transport)), "c1"),
            Arc::clone(&aggregator),
            options(),
        )
        .join()
        .await
        .unwrap();

        assert_eq!(summary.end_reason, EndReason::StreamEnded);
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.messages, 4);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(*transport.seen_continuations.lock(), vec!["c1", "c2", "c3"]);
        assert_eq!(aggregator.stats().participants, 3);
    }

    /// 配信終了時の応答には continuationContents が含まれない
    #[tokio::test]
    async fn test_ended_chat_response_stops_polling() {
        let ended: GetLiveChatResponse =
            serde_json::from_str(r#"{"responseContext":{"serviceTrackingParams":[]}}"#).unwrap();
        let transport = FakeTransport::new(vec![
            page(&["alice", "bob"], Some("c2")),
            Ok(ChatPage::from(&ended)),
        ]);
        let aggregator = Arc::new(Aggregator::new());

        let summary = tokio::time::timeout(
            Duration::from_secs(5),
            LivePollingService::start(
                MessageSource::live(Box::new(Arc::clone(&transport)), "c1"),
                Arc::clone(&aggregator),
                options(),
            )
            .join(),
        )
        .await
        .expect("polling should end on its own")
        .unwrap();

        assert_eq!(summary.end_reason, EndReason::StreamEnded);
        assert_eq!(summary.failures, 0);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(aggregator.stats().participants, 2);
    }

    #[tokio::test]
    async fn test_completed_fetch_is_ingested_before_stop() {
        let transport = FakeTransport::with_latency(
            vec![page(&["alice", "bob", "carol"], Some("c2"))],
            Duration::from_millis(150),
        );
        let aggregator = Arc::new(Aggregator::new());
        let service = LivePollingService::start(
            MessageSource::live(Box::new(Arc::clone(&transport)), "c1"),
            Arc::clone(&aggregator),
            options(),
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(aggregator.snapshot().is_empty());

        let summary = service.shutdown().await.unwrap();
        assert_eq!(summary.end_reason, EndReason::Stopped);
        assert_eq!(aggregator.snapshot().len(), 3);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}

#[cfg(test)]
mod retry_tests {
    use super::*;

    #[tokio::test]
    async fn test_transient_errors_keep_state_and_retry_same_cursor() {
        let transport = FakeTransport::new(vec![
            page(&["alice"], Some("c2")),
            Err(SourceError::Http { status: 503 }),
            Err(SourceError::RateLimited),
            page(&["bob"], None),
        ]);
        let aggregator = Arc::new(Aggregator::new());

        let summary = LivePollingService::start(
            MessageSource::live(Box::new(Arc::clone(&transport)), "c1"),
            Arc::clone(&aggregator),
            options(),
        )
        .join()
        .await
        .unwrap();

        assert_eq!(summary.failures, 2);
        assert_eq!(summary.end_reason, EndReason::StreamEnded);
        assert_eq!(
            *transport.seen_continuations.lock(),
            vec!["c1", "c2", "c2", "c2"]
        );

        let snapshot = aggregator.snapshot();
        assert!(snapshot.get("alice").is_some());
        assert!(snapshot.get("bob").is_some());
    }

    #[tokio::test]
    async fn test_unavailable_chat_ends_polling() {
        let transport = FakeTransport::new(vec![
            page(&["alice"], Some("c2")),
            Err(SourceError::ChatUnavailable("HTTP 403".to_string())),
        ]);
        let aggregator = Arc::new(Aggregator::new());

        let summary = LivePollingService::start(
            MessageSource::live(Box::new(transport), "c1"),
            Arc::clone(&aggregator),
            options(),
        )
        .join()
        .await
        .unwrap();

        assert!(matches!(
            summary.end_reason,
            EndReason::Fatal(SourceError::ChatUnavailable(_))
        ));
        assert_eq!(aggregator.stats().participants, 1);
    }
}

#[cfg(test)]
mod concurrent_access_tests {
    use super::*;

    /// ポーリング中でも集計結果を読み取れることを確認
    #[tokio::test]
    async fn test_snapshots_while_polling() {
        let script = (0..20)
            .map(|i| {
                let author = format!("user{i}");
                page(&[author.as_str()], Some("next"))
            })
            .collect();
        let transport = FakeTransport::with_latency(script, Duration::from_millis(2));
        let aggregator = Arc::new(Aggregator::new());
        let service = LivePollingService::start(
            MessageSource::live(Box::new(transport), "c1"),
            Arc::clone(&aggregator),
            options(),
        );

        let mut last_seen = 0;
        for _ in 0..20 {
            let snapshot = aggregator.snapshot();
            assert!(snapshot.len() >= last_seen);
            assert!(snapshot.iter().all(|p| p.message_count == p.messages.len()));
            last_seen = snapshot.len();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let summary = service.shutdown().await.unwrap();
        assert_eq!(summary.end_reason, EndReason::Stopped);
        assert_eq!(aggregator.snapshot().len(), summary.messages);
    }
}
