use super::aggregator::Snapshot;
use super::ConfigurationError;
use crate::models::{EligibilityResult, Participant};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Raw filter settings as supplied by the operator.
///
/// Signed fields are kept signed so that invalid input is rejected by
/// [`FilterPipeline::new`] instead of being coerced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Keyword that must appear in at least one message
    pub keyword: Option<String>,
    /// Match the keyword case-sensitively
    pub case_sensitive: bool,
    /// Minimum number of messages required
    pub min_messages: i64,
    /// Identities or display names to exclude
    pub blacklist: BTreeSet<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            keyword: None,
            case_sensitive: false,
            min_messages: 1,
            blacklist: BTreeSet::new(),
        }
    }
}

/// Validated, normalized filter pipeline.
///
/// Evaluation is pure: it never mutates participants, so it can be re-run
/// against the same snapshot with any configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPipeline {
    keyword: Option<String>,
    case_sensitive: bool,
    min_messages: usize,
    /// lowercased, trimmed entries
    blacklist: HashSet<String>,
}

/// Snapshot of the active filter settings, for logs and export metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSummary {
    pub keyword: Option<String>,
    pub case_sensitive: bool,
    pub min_messages: usize,
    pub blacklist_count: usize,
    pub blacklisted_users: Vec<String>,
}

impl FilterPipeline {
    /// Validate the configuration and build a pipeline.
    pub fn new(config: &FilterConfig) -> Result<Self, ConfigurationError> {
        if config.min_messages < 0 {
            return Err(ConfigurationError::NegativeMinMessages(config.min_messages));
        }

        let keyword = config
            .keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| {
                if config.case_sensitive {
                    k.to_string()
                } else {
                    k.to_lowercase()
                }
            });

        let blacklist = config
            .blacklist
            .iter()
            .map(|entry| entry.trim().to_lowercase())
            .filter(|entry| !entry.is_empty())
            .collect();

        Ok(Self {
            keyword,
            case_sensitive: config.case_sensitive,
            min_messages: config.min_messages as usize,
            blacklist,
        })
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    fn contains_keyword(&self, participant: &Participant) -> bool {
        let Some(keyword) = self.keyword.as_deref() else {
            return true;
        };

        participant.messages.iter().any(|message| {
            if self.case_sensitive {
                message.contains(keyword)
            } else {
                message.to_lowercase().contains(keyword)
            }
        })
    }

    fn is_blacklisted(&self, participant: &Participant) -> bool {
        if self.blacklist.is_empty() {
            return false;
        }
        self.blacklist
            .contains(&participant.identity.trim().to_lowercase())
            || self
                .blacklist
                .contains(&participant.display_name.trim().to_lowercase())
    }

    /// Decide eligibility of one participant
    pub fn evaluate(&self, participant: &Participant) -> EligibilityResult {
        let keyword_used = self.contains_keyword(participant);
        let blacklisted = self.is_blacklisted(participant);
        let meets_min_messages = participant.message_count >= self.min_messages;

        EligibilityResult {
            identity: participant.identity.clone(),
            keyword_used,
            blacklisted,
            meets_min_messages,
            eligible: !blacklisted && keyword_used && meets_min_messages,
        }
    }

    /// Evaluate every participant of a snapshot, in snapshot order
    pub fn evaluate_all(&self, snapshot: &Snapshot) -> Vec<EligibilityResult> {
        let results: Vec<_> = snapshot.iter().map(|p| self.evaluate(p)).collect();

        tracing::debug!(
            participants = results.len(),
            eligible = results.iter().filter(|r| r.eligible).count(),
            "🔍 Filters evaluated"
        );

        results
    }

    pub fn summary(&self) -> FilterSummary {
        let mut blacklisted_users: Vec<String> = self.blacklist.iter().cloned().collect();
        blacklisted_users.sort();

        FilterSummary {
            keyword: self.keyword.clone(),
            case_sensitive: self.case_sensitive,
            min_messages: self.min_messages,
            blacklist_count: blacklisted_users.len(),
            blacklisted_users,
        }
    }
}

/// Eligible participants of `snapshot`, in snapshot order.
pub fn eligible_participants<'a>(
    snapshot: &'a Snapshot,
    results: &[EligibilityResult],
) -> Vec<&'a Participant> {
    let eligible: HashSet<&str> = results
        .iter()
        .filter(|r| r.eligible)
        .map(|r| r.identity.as_str())
        .collect();

    snapshot
        .iter()
        .filter(|p| eligible.contains(p.identity.as_str()))
        .collect()
}
