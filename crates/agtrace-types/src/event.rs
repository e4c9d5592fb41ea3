use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::lifecycle::{CodeEventType, EvidenceType, EventType, LifecycleStatus, Outcome};

// Code-aware fields, test fields, and enhanced-context fields are mutually
// exclusive in practice but easy to leave bolted onto one flat struct as
// `Option<T>`s that are usually `None`. Here the optional, mutually-exclusive
// detail blocks become a tagged enum: an event either carries no extra
// detail, a code-edit detail block, or a test-run detail block. Matching on
// `payload` makes illegal states (`test_passed` set without a `test_name`,
// `diff` set on a conversation event) unrepresentable instead of merely
// undocumented.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
#[serde(rename_all = "snake_case")]
pub enum EventPayload {
    None,
    Code(CodeDetails),
    Test(TestDetails),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeDetails {
    pub code_event_type: Option<CodeEventType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_metrics: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_quality_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDetails {
    pub test_name: String,
    pub test_passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

/// Context snapshot taken at event time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Display name of the project, carried for working-memory ranking
    /// without a join back to the projects table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_phase_status: Option<String>,
}

/// A single temporal record in the memory substrate.
///
/// Maps 1:1 to an `events` table row. `hash::hash_event` computes a
/// content fingerprint over a fixed subset of these fields for
/// deduplication; see its doc comment for exactly which fields that is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub project_id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,

    pub event_type: Option<EventType>,
    pub content: String,
    pub outcome: Option<Outcome>,

    #[serde(default)]
    pub context: EventContext,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub files_changed: u32,
    #[serde(default)]
    pub lines_added: u32,
    #[serde(default)]
    pub lines_deleted: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learned: Option<String>,
    #[serde(default = "default_unit")]
    pub confidence: f64,

    #[serde(default)]
    pub evidence_type: EvidenceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default = "default_unit")]
    pub evidence_quality: f64,

    #[serde(default)]
    pub lifecycle_status: LifecycleStatus,
    #[serde(default)]
    pub consolidation_score: f64,
    pub last_activation: DateTime<Utc>,
    #[serde(default)]
    pub activation_count: u32,

    #[serde(default = "EventPayload::default_none")]
    pub payload: EventPayload,

    #[serde(default = "default_half")]
    pub importance_score: f64,
    #[serde(default = "default_half")]
    pub actionability_score: f64,
    #[serde(default = "default_half")]
    pub context_completeness_score: f64,
    #[serde(default)]
    pub has_next_step: bool,
    #[serde(default)]
    pub has_blocker: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_decisions: Option<String>,
}

impl EventPayload {
    fn default_none() -> Self {
        EventPayload::None
    }
}

fn default_unit() -> f64 {
    1.0
}

fn default_half() -> f64 {
    0.5
}

impl Event {
    /// Construct a new event with its declared defaults:
    /// `confidence`/`evidence_quality` = 1.0, the three working-memory scores = 0.5,
    /// lifecycle = active, consolidation = 0.0.
    pub fn new(
        project_id: impl Into<String>,
        session_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id: project_id.into(),
            session_id: session_id.into(),
            timestamp,
            event_type: None,
            content: content.into(),
            outcome: None,
            context: EventContext::default(),
            duration_ms: None,
            files_changed: 0,
            lines_added: 0,
            lines_deleted: 0,
            learned: None,
            confidence: 1.0,
            evidence_type: EvidenceType::Observed,
            source_id: None,
            evidence_quality: 1.0,
            lifecycle_status: LifecycleStatus::Active,
            consolidation_score: 0.0,
            last_activation: timestamp,
            activation_count: 0,
            payload: EventPayload::None,
            importance_score: 0.5,
            actionability_score: 0.5,
            context_completeness_score: 0.5,
            has_next_step: false,
            has_blocker: false,
            required_decisions: None,
        }
    }

    /// Validate field invariants: scores stay in `[0, 1]`, and a source
    /// adapter can never hand the pipeline an event timestamped in the
    /// future or carrying no content. A validation failure is
    /// non-retryable — the event is dropped before persistence.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), Error> {
        if self.content.trim().is_empty() {
            return Err(Error::EmptyContent);
        }
        if self.timestamp > now {
            return Err(Error::FutureTimestamp);
        }
        for (field, value) in [
            ("confidence", self.confidence),
            ("evidence_quality", self.evidence_quality),
            ("importance_score", self.importance_score),
            ("actionability_score", self.actionability_score),
            ("context_completeness_score", self.context_completeness_score),
            ("consolidation_score", self.consolidation_score),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidScore { field, value });
            }
        }
        Ok(())
    }
}

/// A named entity extracted from event content, the atomic node of the
/// community graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    pub project_id: String,
    pub name: String,
    pub entity_type: String,
    #[serde(default)]
    pub mention_count: u32,
}

/// A weighted edge between two entities, derived from co-occurrence within episodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub source_entity_id: i64,
    pub target_entity_id: i64,
    pub weight: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_event_matches_declared_defaults() {
        let ts = Utc::now();
        let event = Event::new("proj", "sess", ts, "did a thing");
        assert_eq!(event.confidence, 1.0);
        assert_eq!(event.evidence_quality, 1.0);
        assert_eq!(event.importance_score, 0.5);
        assert_eq!(event.actionability_score, 0.5);
        assert_eq!(event.context_completeness_score, 0.5);
        assert_eq!(event.consolidation_score, 0.0);
        assert_eq!(event.lifecycle_status, LifecycleStatus::Active);
        assert!(matches!(event.payload, EventPayload::None));
    }

    #[test]
    fn validate_rejects_future_timestamp() {
        let now = Utc::now();
        let event = Event::new("proj", "sess", now + chrono::Duration::hours(1), "content");
        assert!(matches!(event.validate(now), Err(crate::Error::FutureTimestamp)));
    }

    #[test]
    fn validate_rejects_empty_content() {
        let now = Utc::now();
        let event = Event::new("proj", "sess", now, "   ");
        assert!(matches!(event.validate(now), Err(crate::Error::EmptyContent)));
    }

    #[test]
    fn validate_rejects_out_of_range_score() {
        let now = Utc::now();
        let mut event = Event::new("proj", "sess", now, "content");
        event.importance_score = 1.5;
        assert!(matches!(
            event.validate(now),
            Err(crate::Error::InvalidScore { field: "importance_score", .. })
        ));
    }

    #[test]
    fn validate_accepts_well_formed_event() {
        let now = Utc::now();
        let event = Event::new("proj", "sess", now, "content");
        assert!(event.validate(now).is_ok());
    }

    #[test]
    fn serialization_round_trips() {
        let ts = Utc::now();
        let mut event = Event::new("proj", "sess", ts, "edited auth.rs");
        event.payload = EventPayload::Code(CodeDetails {
            code_event_type: Some(CodeEventType::CodeEdit),
            file_path: Some("auth.rs".into()),
            symbol_name: None,
            symbol_type: None,
            language: Some("rust".into()),
            diff: None,
            git_commit: None,
            git_author: None,
            performance_metrics: None,
            code_quality_score: None,
        });

        let json = serde_json::to_string(&event).unwrap();
        let round_tripped: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(round_tripped.content, event.content);
        match round_tripped.payload {
            EventPayload::Code(details) => assert_eq!(details.file_path.as_deref(), Some("auth.rs")),
            other => panic!("expected code payload, got {other:?}"),
        }
    }
}
