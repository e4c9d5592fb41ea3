//! Failure recorder: turns an internal failure into a `system_error` event
//! and pushes it through the same pipeline as everything else. Records
//! never recurse — recording a failure must never itself be able to fail
//! loudly.
//!
//! `Outcome::Failure` stays a plain status — it's shared with source
//! adapters (a GitHub PR's `closed` maps to it too) and is serialized as a
//! single SQL column, so it isn't a place to hang a `failure_type` string.
//! That detail goes in `EventContext::task` instead, as `"{component}/{failure_type}"`.

use std::sync::Arc;

use agtrace_core::Clock;
use agtrace_providers::GenerateError;
use agtrace_types::{Event, EventType, Outcome};

use crate::pipeline::{IngestionPipeline, PipelineStats};

/// Coarse severity for a recorded failure, carried via `importance_score`
/// so a failed source sync surfaces in working-memory ranking the same way
/// any other high-importance event would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    fn as_score(self) -> f64 {
        match self {
            Severity::Low => 0.25,
            Severity::Medium => 0.5,
            Severity::High => 0.75,
            Severity::Critical => 1.0,
        }
    }
}

/// Records failures as `system_error` events against a fixed project.
/// There is deliberately no project-per-call parameter: a recorder is
/// scoped to the single workspace store it's watching.
pub struct FailureRecorder {
    project_id: String,
    clock: Arc<dyn Clock>,
}

impl FailureRecorder {
    pub fn new(project_id: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            project_id: project_id.into(),
            clock,
        }
    }

    /// Build and persist a `system_error` event. Never returns an error
    /// itself (see module doc): a failure recording its own failure is
    /// logged to stderr and dropped, not propagated or retried.
    pub async fn record(
        &self,
        pipeline: &mut IngestionPipeline,
        component: &str,
        failure_type: &str,
        message: &str,
        severity: Severity,
        details: Option<&str>,
    ) -> PipelineStats {
        let now = self.clock.now();
        let mut content = message.to_string();
        if let Some(details) = details {
            content.push_str(" | ");
            content.push_str(details);
        }

        let mut event = Event::new(&self.project_id, "system", now, content);
        event.event_type = Some(EventType::SystemError);
        event.outcome = Some(Outcome::Failure);
        event.context.task = Some(format!("{component}/{failure_type}"));
        event.importance_score = severity.as_score();
        event.evidence_type = agtrace_types::EvidenceType::Observed;

        let stats = pipeline.process_batch(vec![event]).await;
        if stats.errors > 0 {
            eprintln!(
                "agtrace: failed to persist failure record for {component}/{failure_type}: {message}"
            );
        }
        stats
    }

    /// Convenience constructor for the common "source sync failed" case.
    /// Severity follows the error's retry classification: a permanent
    /// failure is worse than a source that's still expected to recover.
    pub async fn record_source_failure(
        &self,
        pipeline: &mut IngestionPipeline,
        source_id: &str,
        err: &GenerateError,
    ) -> PipelineStats {
        let severity = match err {
            GenerateError::NonRetryable(_) => Severity::High,
            GenerateError::RateLimited { .. } => Severity::Low,
            GenerateError::Retryable(_) => Severity::Medium,
        };
        self.record(pipeline, source_id, "sync_failure", &err.to_string(), severity, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::embedding::NullEmbeddingProvider;
    use agtrace_core::SystemClock;
    use tokio::sync::Mutex;

    fn pipeline() -> IngestionPipeline {
        let store = agtrace_index::EventStore::open_in_memory().unwrap();
        IngestionPipeline::new(
            Arc::new(Mutex::new(store)),
            Arc::new(NullEmbeddingProvider),
            Arc::new(SystemClock),
            PipelineConfig::default(),
        )
    }

    #[tokio::test]
    async fn records_a_failure_as_a_system_error_event() {
        let recorder = FailureRecorder::new("proj-1", Arc::new(SystemClock));
        let mut pipeline = pipeline();
        let stats = recorder
            .record(
                &mut pipeline,
                "github-sync",
                "rate_limited",
                "GitHub API returned 429",
                Severity::High,
                Some("retry after 60s"),
            )
            .await;
        assert_eq!(stats.inserted, 1);
    }
}
