//! Message sources feeding the aggregator.
//!
//! A [`MessageSource`] yields [`Batch`]es of chat messages. The live variant
//! performs one rate-limited fetch per call through a [`ChatTransport`]; the
//! offline variant hands over a pre-parsed batch in one go. Pacing and
//! termination are left to the caller (see
//! [`crate::service::LivePollingService`]).

use crate::models::{ChatMessage, SourceMode};
use async_trait::async_trait;
use std::time::Duration;

/// Failure while pulling messages from a source.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Transport unavailable: {0}")]
    Transport(String),

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Provider returned HTTP {status}")]
    Http { status: u16 },

    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    #[error("Live chat is not available: {0}")]
    ChatUnavailable(String),
}

impl SourceError {
    /// Whether the caller should back off and retry.
    ///
    /// Client errors other than 429 and a missing live chat will not go away
    /// by retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Transport(_)
            | SourceError::Timeout(_)
            | SourceError::RateLimited
            | SourceError::Decode(_) => true,
            SourceError::Http { status } => *status >= 500 || *status == 429,
            SourceError::ChatUnavailable(_) => false,
        }
    }
}

/// Cursor returned with each batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageToken {
    /// More messages may follow; fetch again with this continuation
    Next(String),
    /// The stream is exhausted
    End,
}

/// One unit of work produced by a source.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub messages: Vec<ChatMessage>,
    pub next: PageToken,
    /// Minimum delay the provider asks for before the next fetch
    pub polling_interval: Option<Duration>,
}

impl Batch {
    pub fn end(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            next: PageToken::End,
            polling_interval: None,
        }
    }

    pub fn is_end(&self) -> bool {
        self.next == PageToken::End
    }
}

/// A page as returned by a transport.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatPage {
    pub messages: Vec<ChatMessage>,
    /// `None` once the provider signals the chat has ended
    pub continuation: Option<String>,
    pub polling_interval: Option<Duration>,
}

/// HTTP boundary to a chat provider.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Fetch the page identified by `continuation`.
    async fn fetch_page(&self, continuation: &str) -> Result<ChatPage, SourceError>;
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for std::sync::Arc<T> {
    async fn fetch_page(&self, continuation: &str) -> Result<ChatPage, SourceError> {
        (**self).fetch_page(continuation).await
    }
}

/// Paginated live polling over a [`ChatTransport`].
pub struct LivePollingSource {
    transport: Box<dyn ChatTransport>,
    continuation: Option<String>,
    fetch_timeout: Duration,
}

impl LivePollingSource {
    pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(transport: Box<dyn ChatTransport>, initial_continuation: impl Into<String>) -> Self {
        Self {
            transport,
            continuation: Some(initial_continuation.into()),
            fetch_timeout: Self::DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn continuation(&self) -> Option<&str> {
        self.continuation.as_deref()
    }

    /// Perform one fetch.
    ///
    /// The continuation only advances on success, so a failed fetch can be
    /// retried without skipping a page.
    pub async fn next_batch(&mut self) -> Result<Batch, SourceError> {
        let Some(continuation) = self.continuation.clone() else {
            return Ok(Batch::end(Vec::new()));
        };

        let page = tokio::time::timeout(self.fetch_timeout, self.transport.fetch_page(&continuation))
            .await
            .map_err(|_| SourceError::Timeout(self.fetch_timeout))??;

        self.continuation = page.continuation.clone();
        let next = match page.continuation {
            Some(token) => PageToken::Next(token),
            None => {
                tracing::info!("🏁 Provider signalled end of live chat");
                PageToken::End
            }
        };

        Ok(Batch {
            messages: page.messages,
            next,
            polling_interval: page.polling_interval,
        })
    }
}

impl std::fmt::Debug for LivePollingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivePollingSource")
            .field("continuation", &self.continuation)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}

/// A finite, already parsed batch of messages.
#[derive(Debug, Clone, Default)]
pub struct OfflineBatchSource {
    pending: Option<Vec<ChatMessage>>,
}

impl OfflineBatchSource {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            pending: Some(messages),
        }
    }

    /// The first call returns everything; later calls return an empty end batch
    pub fn next_batch(&mut self) -> Batch {
        Batch::end(self.pending.take().unwrap_or_default())
    }
}

/// Where chat messages come from.
#[derive(Debug)]
pub enum MessageSource {
    LivePolling(LivePollingSource),
    OfflineBatch(OfflineBatchSource),
}

impl MessageSource {
    pub fn live(transport: Box<dyn ChatTransport>, initial_continuation: impl Into<String>) -> Self {
        MessageSource::LivePolling(LivePollingSource::new(transport, initial_continuation))
    }

    pub fn offline(messages: Vec<ChatMessage>) -> Self {
        MessageSource::OfflineBatch(OfflineBatchSource::new(messages))
    }

    pub fn mode(&self) -> SourceMode {
        match self {
            MessageSource::LivePolling(_) => SourceMode::Live,
            MessageSource::OfflineBatch(_) => SourceMode::Offline,
        }
    }

    pub async fn next_batch(&mut self) -> Result<Batch, SourceError> {
        match self {
            MessageSource::LivePolling(source) => source.next_batch().await,
            MessageSource::OfflineBatch(source) => Ok(source.next_batch()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct ScriptedTransport {
        pages: Mutex<VecDeque<Result<ChatPage, SourceError>>>,
        requested: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(pages: Vec<Result<ChatPage, SourceError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn fetch_page(&self, continuation: &str) -> Result<ChatPage, SourceError> {
            self.requested.lock().push(continuation.to_string());
            self.pages
                .lock()
                .pop_front()
                .unwrap_or(Err(SourceError::Transport("script exhausted".into())))
        }
    }

    struct SlowTransport;

    #[async_trait]
    impl ChatTransport for SlowTransport {
        async fn fetch_page(&self, _continuation: &str) -> Result<ChatPage, SourceError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ChatPage::default())
        }
    }

    fn message(identity: &str) -> ChatMessage {
        ChatMessage::new(identity, identity, "hello", Utc::now())
    }

    #[test]
    fn test_transient_classification() {
        assert!(SourceError::Transport("down".into()).is_transient());
        assert!(SourceError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(SourceError::RateLimited.is_transient());
        assert!(SourceError::Http { status: 503 }.is_transient());
        assert!(SourceError::Http { status: 429 }.is_transient());
        assert!(!SourceError::Http { status: 404 }.is_transient());
        assert!(!SourceError::ChatUnavailable("ended".into()).is_transient());
    }

    #[tokio::test]
    async fn test_offline_source_yields_once() {
        let mut source = MessageSource::offline(vec![message("a"), message("b")]);
        assert_eq!(source.mode(), SourceMode::Offline);

        let first = source.next_batch().await.unwrap();
        assert_eq!(first.messages.len(), 2);
        assert!(first.is_end());
        assert!(first.polling_interval.is_none());

        let second = source.next_batch().await.unwrap();
        assert!(second.messages.is_empty());
        assert!(second.is_end());
    }

    #[tokio::test]
    async fn test_live_source_follows_continuations() {
        let transport = std::sync::Arc::new(ScriptedTransport::new(vec![
            Ok(ChatPage {
                messages: vec![message("a")],
                continuation: Some("page2".into()),
                polling_interval: Some(Duration::from_millis(500)),
            }),
            Err(SourceError::Http { status: 503 }),
            Ok(ChatPage {
                messages: vec![message("b")],
                continuation: None,
                polling_interval: None,
            }),
        ]));
        let mut source = MessageSource::live(Box::new(transport.clone()), "page1");
        assert_eq!(source.mode(), SourceMode::Live);

        let first = source.next_batch().await.unwrap();
        assert_eq!(first.next, PageToken::Next("page2".into()));
        assert_eq!(first.polling_interval, Some(Duration::from_millis(500)));

        assert_eq!(
            source.next_batch().await.unwrap_err(),
            SourceError::Http { status: 503 }
        );

        let last = source.next_batch().await.unwrap();
        assert!(last.is_end());
        assert_eq!(last.messages.len(), 1);

        // already ended: no further requests
        assert!(source.next_batch().await.unwrap().is_end());
        assert_eq!(
            *transport.requested.lock(),
            vec!["page1".to_string(), "page2".to_string(), "page2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_live_source_times_out() {
        let mut source = LivePollingSource::new(Box::new(SlowTransport), "page1")
            .with_fetch_timeout(Duration::from_millis(50));

        let err = source.next_batch().await.unwrap_err();
        assert_eq!(err, SourceError::Timeout(Duration::from_millis(50)));
        assert!(err.is_transient());
        assert_eq!(source.continuation(), Some("page1"));
    }
}
