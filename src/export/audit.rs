use crate::chat_management::Snapshot;
use crate::models::{AuditRecord, EligibilityResult, SelectionOutcome, SourceMode};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Projects an evaluated, drawn snapshot into audit records.
///
/// The projection never re-derives eligibility or re-runs the draw: the
/// records reflect exactly the results it is given. A participant without an
/// eligibility result is recorded as not eligible, not blacklisted and
/// without keyword use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditExporter {
    mode: SourceMode,
    youtube_video_id: Option<String>,
    timestamp: DateTime<Utc>,
}

impl AuditExporter {
    pub fn new(mode: SourceMode, youtube_video_id: Option<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            mode,
            youtube_video_id,
            timestamp,
        }
    }

    /// One record per participant of `snapshot`, in snapshot order
    pub fn export(
        &self,
        snapshot: &Snapshot,
        results: &[EligibilityResult],
        outcome: &SelectionOutcome,
    ) -> Vec<AuditRecord> {
        let by_identity: HashMap<&str, &EligibilityResult> =
            results.iter().map(|r| (r.identity.as_str(), r)).collect();

        snapshot
            .iter()
            .map(|participant| {
                let result = by_identity.get(participant.identity.as_str());
                let draw_order = outcome.draw_order_of(&participant.identity);

                AuditRecord {
                    timestamp: self.timestamp,
                    youtube_video_id: self.youtube_video_id.clone(),
                    mode: self.mode,
                    identity: participant.identity.clone(),
                    display_name: participant.display_name.clone(),
                    message_count: participant.message_count,
                    first_seen: participant.first_seen,
                    keyword_used: result.is_some_and(|r| r.keyword_used),
                    blacklisted: result.is_some_and(|r| r.blacklisted),
                    eligible: result.is_some_and(|r| r.eligible),
                    selected_as_winner: draw_order.is_some(),
                    draw_order,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_management::{Aggregator, FilterConfig, FilterPipeline};
    use crate::models::{ChatMessage, DrawnWinner};
    use chrono::TimeZone;

    fn snapshot() -> Snapshot {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let aggregator = Aggregator::new();
        aggregator.ingest_batch(&[
            ChatMessage::new("a", "Alice", "giveaway!", at),
            ChatMessage::new("b", "Bob", "hi", at),
            ChatMessage::new("c", "Carol", "giveaway", at),
        ]);
        aggregator.snapshot()
    }

    #[test]
    fn test_one_record_per_participant() {
        let snapshot = snapshot();
        let pipeline = FilterPipeline::new(&FilterConfig {
            keyword: Some("giveaway".to_string()),
            ..Default::default()
        })
        .unwrap();
        let results = pipeline.evaluate_all(&snapshot);
        let outcome = SelectionOutcome {
            winners: vec![DrawnWinner {
                identity: "c".to_string(),
                draw_order: 1,
            }],
            weighted: false,
            seed: Some(1),
            pool_size: 2,
        };

        let now = Utc::now();
        let exporter = AuditExporter::new(SourceMode::Offline, Some("vid".to_string()), now);
        let records = exporter.export(&snapshot, &results, &outcome);

        assert_eq!(records.len(), snapshot.len());
        let identities: Vec<_> = records.iter().map(|r| r.identity.as_str()).collect();
        assert_eq!(identities, vec!["a", "b", "c"]);

        let bob = &records[1];
        assert!(!bob.eligible);
        assert!(!bob.keyword_used);
        assert!(!bob.selected_as_winner);
        assert_eq!(bob.draw_order, None);

        let carol = &records[2];
        assert!(carol.eligible);
        assert!(carol.selected_as_winner);
        assert_eq!(carol.draw_order, Some(1));
        assert_eq!(carol.timestamp, now);
        assert_eq!(carol.youtube_video_id.as_deref(), Some("vid"));
    }

    #[test]
    fn test_missing_results_are_not_eligible() {
        let snapshot = snapshot();
        let exporter = AuditExporter::new(SourceMode::Live, None, Utc::now());
        let records = exporter.export(&snapshot, &[], &SelectionOutcome::default());

        assert_eq!(records.len(), 3);
        assert!(records
            .iter()
            .all(|r| !r.eligible && !r.blacklisted && !r.keyword_used && !r.selected_as_winner));
    }

    #[test]
    fn test_export_does_not_rederive_eligibility() {
        let snapshot = snapshot();
        // deliberately inconsistent with the messages: the exporter must echo it
        let results = vec![EligibilityResult {
            identity: "b".to_string(),
            keyword_used: true,
            blacklisted: false,
            meets_min_messages: true,
            eligible: true,
        }];
        let exporter = AuditExporter::new(SourceMode::Offline, None, Utc::now());
        let records = exporter.export(&snapshot, &results, &SelectionOutcome::default());

        assert!(records[1].eligible);
        assert!(records[1].keyword_used);
        assert!(!records[0].eligible);
    }
}
