//! Per-session participant aggregation.
//!
//! The [`Aggregator`] is the only component that mutates participant state.
//! Readers take a [`Snapshot`], an owned copy that later ingestion cannot
//! tear.

use crate::models::{ChatMessage, Participant};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct AggregatorState {
    /// Participants in first-arrival order
    participants: Vec<Participant>,
    /// identity -> position in `participants`
    index: HashMap<String, usize>,
    total_messages: usize,
    last_ingest_at: Option<DateTime<Utc>>,
}

impl AggregatorState {
    fn ingest(&mut self, message: &ChatMessage) {
        match self.index.get(&message.author_identity) {
            Some(&position) => self.participants[position].record(message),
            None => {
                self.index
                    .insert(message.author_identity.clone(), self.participants.len());
                self.participants
                    .push(Participant::from_first_message(message));
            }
        }
        self.total_messages += 1;
    }
}

/// Aggregation statistics for status display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatorStats {
    pub participants: usize,
    pub total_messages: usize,
    pub last_ingest_at: Option<DateTime<Utc>>,
}

/// Folds chat messages into per-identity participant state.
///
/// Deduplication is keyed on `author_identity`; display names may collide or
/// change. Retained message text is not capped here, callers that need a
/// memory bound must cap upstream.
#[derive(Debug, Default)]
pub struct Aggregator {
    state: RwLock<AggregatorState>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one message into the participant map
    pub fn ingest(&self, message: &ChatMessage) {
        let mut state = self.state.write();
        state.ingest(message);
        state.last_ingest_at = Some(Utc::now());
    }

    /// Fold a whole batch under a single write lock, so a snapshot never sees
    /// half of a fetched page. Returns the number of messages ingested.
    pub fn ingest_batch<'a, I>(&self, messages: I) -> usize
    where
        I: IntoIterator<Item = &'a ChatMessage>,
    {
        let mut state = self.state.write();
        let mut count = 0;
        for message in messages {
            state.ingest(message);
            count += 1;
        }
        if count > 0 {
            state.last_ingest_at = Some(Utc::now());
        }
        tracing::debug!(
            ingested = count,
            participants = state.participants.len(),
            "📥 Batch ingested"
        );
        count
    }

    /// Owned copy of the current participant map
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.read();
        Snapshot {
            participants: state.participants.clone(),
            index: state.index.clone(),
        }
    }

    pub fn stats(&self) -> AggregatorStats {
        let state = self.state.read();
        AggregatorStats {
            participants: state.participants.len(),
            total_messages: state.total_messages,
            last_ingest_at: state.last_ingest_at,
        }
    }

    /// Drop every participant and reset statistics
    pub fn clear(&self) {
        *self.state.write() = AggregatorState::default();
        tracing::info!("🗑️ Participants cleared");
    }
}

/// Immutable copy of the aggregated participants, in first-arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    participants: Vec<Participant>,
    index: HashMap<String, usize>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn get(&self, identity: &str) -> Option<&Participant> {
        self.index
            .get(identity)
            .and_then(|&position| self.participants.get(position))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Participant> {
        self.participants.iter()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn total_messages(&self) -> usize {
        self.participants.iter().map(|p| p.message_count).sum()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Participant;
    type IntoIter = std::slice::Iter<'a, Participant>;

    fn into_iter(self) -> Self::IntoIter {
        self.participants.iter()
    }
}
