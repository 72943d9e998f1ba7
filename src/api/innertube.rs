pub mod get_live_chat;

use crate::api::innertube::get_live_chat::{
    get_next_continuation, get_polling_interval, GetLiveChatResponse,
};
use crate::api::youtube::{self, ApiKey, ClientVersion, Continuation, VideoId};
use crate::io::RawResponseRecorder;
use crate::source::{ChatPage, ChatTransport, SourceError};
use async_trait::async_trait;
use reqwest::StatusCode;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const GET_LIVE_CHAT_URL: &str = "https://www.youtube.com/youtubei/v1/live_chat/get_live_chat";
const GET_LIVE_CHAT_REPLAY_URL: &str =
    "https://www.youtube.com/youtubei/v1/live_chat/get_live_chat_replay";

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Unexpected HTTP status: {0}")]
    Status(StatusCode),
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0} not found in watch page")]
    MissingField(&'static str),
}

impl From<FetchError> for SourceError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::Request(e) if e.is_decode() => SourceError::Decode(e.to_string()),
            FetchError::Request(e) => SourceError::Transport(e.to_string()),
            FetchError::Status(StatusCode::TOO_MANY_REQUESTS) => SourceError::RateLimited,
            FetchError::Status(status @ (StatusCode::FORBIDDEN | StatusCode::NOT_FOUND)) => {
                SourceError::ChatUnavailable(format!("HTTP {}", status.as_u16()))
            }
            FetchError::Status(status) => SourceError::Http {
                status: status.as_u16(),
            },
            FetchError::Serialization(e) => SourceError::Decode(e.to_string()),
            FetchError::MissingField(field) => {
                SourceError::ChatUnavailable(format!("{} not found", field))
            }
        }
    }
}

/// Client parameters scraped from a watch page.
#[derive(Debug, Clone)]
pub struct InnerTube {
    pub video_id: VideoId,
    pub api_key: ApiKey,
    pub is_replay: bool,
    pub client_version: ClientVersion,
    pub gl: String,
    pub hl: String,
    /// Continuation for the first `get_live_chat` request
    pub continuation: Continuation,
    pub http_client: reqwest::Client,
}

impl InnerTube {
    pub fn new(video_id: VideoId, api_key: ApiKey, client_version: ClientVersion) -> Self {
        Self {
            video_id,
            api_key,
            is_replay: false,
            client_version,
            gl: "US".to_string(),
            hl: "en".to_string(),
            continuation: Continuation(String::new()),
            http_client: reqwest::Client::new(),
        }
    }

    /// Parse the InnerTube bootstrap parameters out of watch page HTML
    pub fn from_watch_page(html: &str) -> Result<Self, FetchError> {
        let video_id = youtube::extract_video_id(html).ok_or(FetchError::MissingField("video_id"))?;
        let api_key = youtube::extract_api_key(html).ok_or(FetchError::MissingField("api_key"))?;
        let client_version = youtube::extract_client_version(html)
            .ok_or(FetchError::MissingField("client_version"))?;
        let continuation = youtube::extract_continuation(html)
            .ok_or(FetchError::MissingField("continuation"))?;

        let mut inner_tube = InnerTube::new(video_id, api_key, client_version);
        inner_tube.is_replay = youtube::extract_replay(html);
        if let Some(gl) = youtube::extract_gl(html) {
            inner_tube.gl = gl;
        }
        if let Some(hl) = youtube::extract_hl(html) {
            inner_tube.hl = hl;
        }
        inner_tube.continuation = continuation;
        Ok(inner_tube)
    }

    /// `get_live_chat` for live streams, `get_live_chat_replay` for archives
    pub fn live_chat_endpoint(&self) -> &'static str {
        if self.is_replay {
            GET_LIVE_CHAT_REPLAY_URL
        } else {
            GET_LIVE_CHAT_URL
        }
    }
}

pub async fn fetch_live_chat_page(url: &str) -> Result<InnerTube, FetchError> {
    tracing::info!("🌐 Fetching live chat page from URL: {}", url);

    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .header("User-Agent", USER_AGENT)
        .send()
        .await
        .map_err(|e| {
            tracing::error!("❌ Failed to fetch URL: {}", e);
            e
        })?;

    let status = response.status();
    tracing::debug!("📄 Received HTTP response with status: {}", status);
    if !status.is_success() {
        return Err(FetchError::Status(status));
    }

    let html = response.text().await?;
    tracing::debug!("📄 HTML response length: {} chars", html.len());

    let inner_tube = InnerTube::from_watch_page(&html).map_err(|e| {
        tracing::error!("❌ {}", e);
        e
    })?;

    tracing::info!(
        video_id = %inner_tube.video_id,
        client_version = %inner_tube.client_version,
        is_replay = inner_tube.is_replay,
        "✅ Successfully initialized InnerTube client"
    );
    Ok(inner_tube)
}

pub async fn fetch_live_chat_messages(
    inner_tube: &InnerTube,
    continuation: &Continuation,
) -> Result<GetLiveChatResponse, FetchError> {
    let url = format!("{}?key={}", inner_tube.live_chat_endpoint(), inner_tube.api_key);

    let payload = serde_json::json!({
        "context": {
            "client": {
                "clientName": "WEB",
                "clientVersion": inner_tube.client_version.to_string(),
                "gl": inner_tube.gl,
                "hl": inner_tube.hl,
            }
        },
        "continuation": continuation.0,
    });

    let response = inner_tube
        .http_client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("User-Agent", USER_AGENT)
        .json(&payload)
        .send()
        .await
        .map_err(|e| {
            tracing::error!("❌ HTTP request failed: {}", e);
            e
        })?;

    let status = response.status();
    tracing::debug!("📡 API response status: {}", status);
    if !status.is_success() {
        tracing::warn!("⚠️ get_live_chat failed with status: {}", status);
        return Err(FetchError::Status(status));
    }

    let response_text = response.text().await?;
    let live_chat_response: GetLiveChatResponse =
        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!("❌ Failed to parse JSON response: {}", e);
            tracing::debug!(
                "🔍 Response text preview: {}",
                response_text.chars().take(200).collect::<String>()
            );
            e
        })?;

    Ok(live_chat_response)
}

/// [`ChatTransport`] backed by YouTube's InnerTube `get_live_chat` endpoint.
#[derive(Debug)]
pub struct InnerTubeTransport {
    inner_tube: InnerTube,
    recorder: Option<RawResponseRecorder>,
}

impl InnerTubeTransport {
    pub fn new(inner_tube: InnerTube) -> Self {
        Self {
            inner_tube,
            recorder: None,
        }
    }

    /// Bootstrap from a watch page URL.
    ///
    /// Returns the transport and the continuation for the first fetch.
    pub async fn connect(url: &str) -> Result<(Self, Continuation), FetchError> {
        let inner_tube = fetch_live_chat_page(url).await?;
        let continuation = inner_tube.continuation.clone();
        Ok((Self::new(inner_tube), continuation))
    }

    /// Append every raw response to an NDJSON recording
    pub fn with_recorder(mut self, recorder: RawResponseRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn video_id(&self) -> &VideoId {
        &self.inner_tube.video_id
    }

    pub fn is_replay(&self) -> bool {
        self.inner_tube.is_replay
    }
}

#[async_trait]
impl ChatTransport for InnerTubeTransport {
    async fn fetch_page(&self, continuation: &str) -> Result<ChatPage, SourceError> {
        let response =
            fetch_live_chat_messages(&self.inner_tube, &Continuation(continuation.to_string()))
                .await?;

        if let Some(recorder) = &self.recorder {
            // recording is best effort
            if let Err(e) = recorder.record(&response) {
                tracing::warn!("⚠️ Failed to record raw response: {}", e);
            }
        }

        let page = ChatPage::from(&response);

        tracing::debug!(
            actions = response.actions().len(),
            messages = page.messages.len(),
            "📬 Live chat page received"
        );
        Ok(page)
    }
}

impl From<&GetLiveChatResponse> for ChatPage {
    /// A response without a continuation marks the end of the chat
    fn from(response: &GetLiveChatResponse) -> Self {
        ChatPage {
            messages: response.chat_messages(),
            continuation: get_next_continuation(response),
            polling_interval: get_polling_interval(response),
        }
    }
}
