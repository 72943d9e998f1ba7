//! YouTube Live Chat API response model.
//!
//! Only the parts of the InnerTube `get_live_chat` response needed to turn
//! text messages into [`ChatMessage`]s are modelled; everything else is
//! kept as raw JSON or ignored.

use crate::models::ChatMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Entry in a recorded response stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEntry {
    /// Unix timestamp when the entry was received
    pub timestamp: u64,
    /// The actual response from the YouTube API
    pub response: GetLiveChatResponse,
}

/// Response from the YouTube Live Chat API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetLiveChatResponse {
    /// The contents of the continuation, including chat messages.
    /// Absent once the chat has ended.
    #[serde(
        rename = "continuationContents",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub continuation_contents: Option<ContinuationContents>,
}

/// Container for the live chat continuation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuationContents {
    #[serde(rename = "liveChatContinuation")]
    pub live_chat_continuation: LiveChatContinuation,
}

/// Live chat continuation containing actions and tokens for the next request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveChatContinuation {
    /// Token for fetching the next batch of messages (may be absent in some responses)
    pub continuation: Option<Continuation>,
    /// Array of actions like new messages, deletions, etc.
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Continuation data (`invalidationContinuationData`, `timedContinuationData`, ...)
    #[serde(default)]
    pub continuations: Vec<serde_json::Value>,
}

/// Continuation token for fetching the next batch of messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Continuation(pub String);

/// A message containing a sequence of text and/or emoji runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub runs: Vec<MessageRun>,
}

/// A fragment of a message, containing either text or an emoji.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRun {
    pub text: Option<String>,
    pub emoji: Option<Emoji>,
}

impl MessageRun {
    pub fn get_text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn get_emoji(&self) -> Option<&Emoji> {
        self.emoji.as_ref()
    }
}

/// Emoji data structure for custom and standard emojis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Emoji {
    #[serde(rename = "emojiId", default)]
    pub emoji_id: String,
    #[serde(default)]
    pub shortcuts: Vec<String>,
    #[serde(rename = "isCustomEmoji", default)]
    pub is_custom_emoji: bool,
}

impl Emoji {
    /// Text used for the emoji in keyword matching: the first shortcut
    /// (`:smile:`), falling back to the emoji ID (the character itself for
    /// standard emojis)
    pub fn as_text(&self) -> &str {
        self.shortcuts
            .first()
            .map(String::as_str)
            .unwrap_or(&self.emoji_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorName {
    #[serde(rename = "simpleText")]
    pub simple_text: String,
}

/// Renderer for a standard text message in live chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveChatTextMessageRenderer {
    pub id: String,
    #[serde(default)]
    pub message: Message,
    #[serde(rename = "authorName", default)]
    pub author_name: AuthorName,
    /// Timestamp in microseconds when the message was sent
    #[serde(rename = "timestampUsec")]
    pub timestamp_usec: String,
    #[serde(rename = "authorExternalChannelId", default)]
    pub author_external_channel_id: String,
}

impl LiveChatTextMessageRenderer {
    /// Message text with emoji runs rendered inline
    pub fn plain_text(&self) -> String {
        self.message
            .runs
            .iter()
            .map(|run| match (run.get_text(), run.get_emoji()) {
                (Some(text), _) => text,
                (None, Some(emoji)) => emoji.as_text(),
                (None, None) => "",
            })
            .collect()
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp_usec
            .parse::<i64>()
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_micros)
    }

    pub fn to_chat_message(&self) -> ChatMessage {
        let display_name = self.author_name.simple_text.clone();
        let identity = if self.author_external_channel_id.is_empty() {
            display_name.trim().to_lowercase()
        } else {
            self.author_external_channel_id.clone()
        };

        ChatMessage {
            author_identity: identity,
            author_display_name: display_name,
            text: self.plain_text(),
            observed_at: self.sent_at().unwrap_or_else(Utc::now),
        }
    }
}

/// Wrapper for an AddChatItemAction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddChatItemActionWrapper {
    #[serde(rename = "addChatItemAction")]
    pub action: AddChatItemAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddChatItemAction {
    pub item: ChatItem,
    #[serde(rename = "clientId", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// Wrapper for a ReplayChatItemAction (archived chat of a finished stream).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayChatItemActionWrapper {
    #[serde(rename = "replayChatItemAction")]
    pub action: ReplayChatItemAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayChatItemAction {
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(
        rename = "videoOffsetTimeMsec",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub video_offset_time_msec: Option<String>,
}

/// Enum representing different types of actions in the live chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Action {
    /// Action to add a new chat message
    AddChatItem(AddChatItemActionWrapper),
    /// Replayed actions, as returned by `get_live_chat_replay`
    ReplayChatItem(ReplayChatItemActionWrapper),
    /// Tickers, deletions, moderation commands, ...
    Unknown(serde_json::Value),
}

/// Enum representing different types of chat items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatItem {
    TextMessage {
        #[serde(rename = "liveChatTextMessageRenderer")]
        renderer: LiveChatTextMessageRenderer,
    },
    /// Paid messages, memberships, engagement banners, ...
    Unknown(serde_json::Value),
}

impl ChatItem {
    pub fn get_type(&self) -> &'static str {
        match self {
            ChatItem::TextMessage { .. } => "textMessage",
            ChatItem::Unknown(_) => "unknown",
        }
    }
}

impl GetLiveChatResponse {
    pub fn live_chat_continuation(&self) -> Option<&LiveChatContinuation> {
        self.continuation_contents
            .as_ref()
            .map(|c| &c.live_chat_continuation)
    }

    pub fn actions(&self) -> &[Action] {
        self.live_chat_continuation()
            .map(|c| c.actions.as_slice())
            .unwrap_or(&[])
    }

    /// Text messages in this response, in arrival order
    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::new();
        collect_chat_messages(self.actions(), &mut messages);
        messages
    }
}

fn collect_chat_messages(actions: &[Action], out: &mut Vec<ChatMessage>) {
    for action in actions {
        match action {
            Action::AddChatItem(wrapper) => {
                if let ChatItem::TextMessage { renderer } = &wrapper.action.item {
                    out.push(renderer.to_chat_message());
                }
            }
            Action::ReplayChatItem(wrapper) => collect_chat_messages(&wrapper.action.actions, out),
            Action::Unknown(_) => {}
        }
    }
}

fn first_continuation_data(response: &GetLiveChatResponse) -> Option<&serde_json::Value> {
    response
        .live_chat_continuation()?
        .continuations
        .first()
        .and_then(|v| {
            v.get("invalidationContinuationData")
                .or_else(|| v.get("timedContinuationData"))
                .or_else(|| v.get("reloadContinuationData"))
                .or_else(|| v.get("liveChatReplayContinuationData"))
        })
}

/// Extract the continuation token for the next request from a response.
///
/// Returns `None` when the provider signals that the chat has ended.
pub fn get_next_continuation(response: &GetLiveChatResponse) -> Option<String> {
    first_continuation_data(response)
        .and_then(|v| v.get("continuation"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .or_else(|| {
            response
                .live_chat_continuation()
                .and_then(|c| c.continuation.as_ref())
                .map(|c| c.0.clone())
        })
        .filter(|s| !s.is_empty())
}

/// Provider-mandated delay before the next request (`timeoutMs`)
pub fn get_polling_interval(response: &GetLiveChatResponse) -> Option<Duration> {
    first_continuation_data(response)
        .and_then(|v| v.get("timeoutMs"))
        .and_then(|v| v.as_u64())
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> GetLiveChatResponse {
        serde_json::from_value(serde_json::json!({
            "continuationContents": {
                "liveChatContinuation": {
                    "continuations": [{
                        "invalidationContinuationData": {
                            "continuation": "next_token",
                            "timeoutMs": 5000
                        }
                    }],
                    "actions": [
                        {
                            "clickTrackingParams": "abc",
                            "addChatItemAction": {
                                "clientId": "c1",
                                "item": {
                                    "liveChatTextMessageRenderer": {
                                        "id": "m1",
                                        "message": { "runs": [
                                            { "text": "join the giveaway " },
                                            { "emoji": {
                                                "emojiId": "UCx/party",
                                                "shortcuts": [":party:"],
                                                "isCustomEmoji": true,
                                                "image": { "thumbnails": [] }
                                            } }
                                        ] },
                                        "authorName": { "simpleText": "Alice" },
                                        "authorPhoto": { "thumbnails": [] },
                                        "timestampUsec": "1700000000123456",
                                        "authorExternalChannelId": "UC_alice"
                                    }
                                }
                            }
                        },
                        {
                            "addChatItemAction": {
                                "item": {
                                    "liveChatPaidMessageRenderer": { "id": "p1" }
                                }
                            }
                        },
                        { "removeChatItemAction": { "targetItemId": "m0" } }
                    ]
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_chat_messages_extracts_text_messages_only() {
        let response = sample_response();
        let messages = response.chat_messages();

        assert_eq!(messages.len(), 1);
        let message = &messages[0];
        assert_eq!(message.author_identity, "UC_alice");
        assert_eq!(message.author_display_name, "Alice");
        assert_eq!(message.text, "join the giveaway :party:");
        assert_eq!(message.observed_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_continuation_and_polling_interval() {
        let response = sample_response();
        assert_eq!(get_next_continuation(&response).as_deref(), Some("next_token"));
        assert_eq!(
            get_polling_interval(&response),
            Some(Duration::from_millis(5000))
        );
    }

    #[test]
    fn test_missing_continuation_means_end() {
        let response: GetLiveChatResponse = serde_json::from_value(serde_json::json!({
            "continuationContents": { "liveChatContinuation": { "actions": [] } }
        }))
        .unwrap();
        assert!(get_next_continuation(&response).is_none());
        assert!(get_polling_interval(&response).is_none());
    }

    #[test]
    fn test_ended_chat_has_no_continuation_contents() {
        let response: GetLiveChatResponse = serde_json::from_value(serde_json::json!({
            "responseContext": { "serviceTrackingParams": [] }
        }))
        .unwrap();

        assert!(response.continuation_contents.is_none());
        assert!(response.actions().is_empty());
        assert!(response.chat_messages().is_empty());
        assert!(get_next_continuation(&response).is_none());
        assert!(get_polling_interval(&response).is_none());
    }

    #[test]
    fn test_replay_actions_are_unwrapped() {
        let response: GetLiveChatResponse = serde_json::from_value(serde_json::json!({
            "continuationContents": {
                "liveChatContinuation": {
                    "continuations": [{
                        "liveChatReplayContinuationData": { "continuation": "replay_next" }
                    }],
                    "actions": [{
                        "replayChatItemAction": {
                            "videoOffsetTimeMsec": "1500",
                            "actions": [{
                                "addChatItemAction": {
                                    "item": {
                                        "liveChatTextMessageRenderer": {
                                            "id": "r1",
                                            "message": { "runs": [{ "text": "giveaway" }] },
                                            "authorName": { "simpleText": "Bob" },
                                            "timestampUsec": "1700000000000000",
                                            "authorExternalChannelId": "UC_bob"
                                        }
                                    }
                                }
                            }]
                        }
                    }]
                }
            }
        }))
        .unwrap();

        let messages = response.chat_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].author_identity, "UC_bob");
        assert_eq!(get_next_continuation(&response).as_deref(), Some("replay_next"));
    }

    #[test]
    fn test_message_run_emoji_extraction() {
        let emoji = Emoji {
            emoji_id: "😀".to_string(),
            shortcuts: vec![],
            is_custom_emoji: false,
        };
        let run = MessageRun {
            text: None,
            emoji: Some(emoji),
        };
        assert!(run.get_text().is_none());
        assert_eq!(run.get_emoji().unwrap().as_text(), "😀");
    }

    #[test]
    fn test_identity_falls_back_to_display_name() {
        let renderer = LiveChatTextMessageRenderer {
            id: "x".to_string(),
            message: Message::default(),
            author_name: AuthorName {
                simple_text: " Guest ".to_string(),
            },
            timestamp_usec: "not-a-number".to_string(),
            author_external_channel_id: String::new(),
        };
        let message = renderer.to_chat_message();
        assert_eq!(message.author_identity, "guest");
        assert_eq!(message.text, "");
    }
}
