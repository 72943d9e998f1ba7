//! One giveaway: an aggregator plus the draw run against it.

use crate::chat_management::{
    eligible_participants, select_with_config, Aggregator, ConfigurationError, FilterConfig,
    FilterPipeline, SelectionConfig, Snapshot,
};
use crate::export::{AuditExport, AuditExporter, DrawMetadata};
use crate::models::{EligibilityResult, Participant, SelectionOutcome, SourceMode};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Giveaway session.
///
/// Owns the participant map for its whole lifetime; a new giveaway gets a new
/// session. The aggregator is shared with the polling task through
/// [`aggregator`](Self::aggregator).
#[derive(Debug)]
pub struct GiveawaySession {
    id: Uuid,
    created_at: DateTime<Utc>,
    mode: SourceMode,
    video_id: Option<String>,
    aggregator: Arc<Aggregator>,
}

/// Everything one draw produced, from the snapshot it was run on to the
/// export built from it.
#[derive(Debug, Clone)]
pub struct DrawResult {
    pub snapshot: Snapshot,
    pub eligibility: Vec<EligibilityResult>,
    pub outcome: SelectionOutcome,
    pub export: AuditExport,
}

impl DrawResult {
    /// Winning participants in draw order
    pub fn winners(&self) -> Vec<&Participant> {
        self.outcome
            .identities()
            .filter_map(|identity| self.snapshot.get(identity))
            .collect()
    }

    pub fn eligible_count(&self) -> usize {
        self.eligibility.iter().filter(|r| r.eligible).count()
    }
}

impl GiveawaySession {
    pub fn new(mode: SourceMode, video_id: Option<String>) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            mode,
            video_id,
            aggregator: Arc::new(Aggregator::new()),
        };

        tracing::info!(
            session_id = %session.id,
            %mode,
            video_id = session.video_id.as_deref().unwrap_or("-"),
            "🎁 Giveaway session created"
        );

        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    pub fn video_id(&self) -> Option<&str> {
        self.video_id.as_deref()
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    /// Filter, draw and build the audit export over one snapshot.
    ///
    /// Both configurations are validated before the snapshot is taken, so an
    /// invalid configuration never produces a partial result. The draw may be
    /// re-run any number of times; it never mutates the aggregator.
    pub fn draw(
        &self,
        filter: &FilterConfig,
        selection: &SelectionConfig,
    ) -> Result<DrawResult, ConfigurationError> {
        let pipeline = FilterPipeline::new(filter)?;
        let requested_winners = selection.validate()?;

        let snapshot = self.aggregator.snapshot();
        let eligibility = pipeline.evaluate_all(&snapshot);
        let eligible = eligible_participants(&snapshot, &eligibility);
        let eligible_count = eligible.len();
        let outcome = select_with_config(&eligible, selection)?;

        let exported_at = Utc::now();
        let records = AuditExporter::new(self.mode, self.video_id.clone(), exported_at).export(
            &snapshot,
            &eligibility,
            &outcome,
        );

        let metadata = DrawMetadata {
            session_id: self.id.to_string(),
            created_at: self.created_at,
            exported_at,
            mode: self.mode,
            youtube_video_id: self.video_id.clone(),
            filters: Some(pipeline.summary()),
            weighted: outcome.weighted,
            seed: outcome.seed,
            requested_winners,
            eligible_count,
            total_participants: snapshot.len(),
        };

        tracing::info!(
            session_id = %self.id,
            participants = snapshot.len(),
            eligible = eligible_count,
            winners = outcome.len(),
            "🏆 Draw completed"
        );

        Ok(DrawResult {
            eligibility,
            outcome,
            export: AuditExport { metadata, records },
            snapshot,
        })
    }
}
