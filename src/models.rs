//! Core data structures shared by the aggregation, filtering, selection and
//! export stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single chat message as produced by a message source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Stable key of the author (channel ID for live chat, normalized
    /// username for offline imports)
    pub author_identity: String,
    /// Display name at the time the message was observed
    pub author_display_name: String,
    /// Plain text body of the message
    pub text: String,
    /// When the message was sent or observed
    pub observed_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        author_identity: impl Into<String>,
        author_display_name: impl Into<String>,
        text: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            author_identity: author_identity.into(),
            author_display_name: author_display_name.into(),
            text: text.into(),
            observed_at,
        }
    }
}

/// Accumulated state of one chat participant.
///
/// `message_count` always equals `messages.len()`; both only ever grow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub identity: String,
    pub display_name: String,
    pub message_count: usize,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub messages: Vec<String>,
}

impl Participant {
    /// Create a participant from the first message seen for its identity
    pub fn from_first_message(message: &ChatMessage) -> Self {
        Self {
            identity: message.author_identity.clone(),
            display_name: message.author_display_name.clone(),
            message_count: 1,
            first_seen: message.observed_at,
            last_seen: message.observed_at,
            messages: vec![message.text.clone()],
        }
    }

    /// Fold another message from the same author into this participant
    pub fn record(&mut self, message: &ChatMessage) {
        debug_assert_eq!(self.identity, message.author_identity);

        self.messages.push(message.text.clone());
        self.message_count += 1;
        self.first_seen = self.first_seen.min(message.observed_at);
        self.last_seen = self.last_seen.max(message.observed_at);
        self.display_name = message.author_display_name.clone();
    }
}

/// Where the session's messages came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    #[display("live")]
    Live,
    #[display("offline")]
    Offline,
}

/// Filter verdict for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub identity: String,
    /// True if the keyword appears in any retained message, or if no keyword
    /// is configured
    pub keyword_used: bool,
    pub blacklisted: bool,
    pub meets_min_messages: bool,
    pub eligible: bool,
}

impl EligibilityResult {
    /// Human-readable reasons why the participant is not eligible
    pub fn reasons(&self) -> Vec<&'static str> {
        let mut reasons = Vec::new();
        if self.blacklisted {
            reasons.push("username is blacklisted");
        }
        if !self.meets_min_messages {
            reasons.push("message count below minimum");
        }
        if !self.keyword_used {
            reasons.push("no message contains the required keyword");
        }
        reasons
    }
}

/// One drawn winner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawnWinner {
    pub identity: String,
    /// 1-based position in the draw sequence
    pub draw_order: u32,
}

/// Winners in the order they were drawn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionOutcome {
    pub winners: Vec<DrawnWinner>,
    pub weighted: bool,
    /// Seed used for the draw; `None` when entropy was used
    pub seed: Option<u64>,
    /// Number of eligible participants the draw was made from
    pub pool_size: usize,
}

impl SelectionOutcome {
    pub fn len(&self) -> usize {
        self.winners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.winners.is_empty()
    }

    pub fn draw_order_of(&self, identity: &str) -> Option<u32> {
        self.winners
            .iter()
            .find(|w| w.identity == identity)
            .map(|w| w.draw_order)
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.winners.iter().map(|w| w.identity.as_str())
    }
}

/// One exported row per participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    #[serde(rename = "timestamp_iso")]
    pub timestamp: DateTime<Utc>,
    pub youtube_video_id: Option<String>,
    pub mode: SourceMode,
    pub identity: String,
    pub display_name: String,
    pub message_count: usize,
    pub first_seen: DateTime<Utc>,
    pub keyword_used: bool,
    pub blacklisted: bool,
    pub eligible: bool,
    pub selected_as_winner: bool,
    pub draw_order: Option<u32>,
}
