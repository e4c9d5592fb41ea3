//! Multi-source orchestrator: runs N `SourceAdapter`s each in its own
//! `tokio` task per cycle (per-source isolation — one source's retry storm
//! can't stall another), feeds whatever they produce through the shared
//! ingestion pipeline, and persists each source's cursor only after
//! its batch has been durably flushed. A source's cursor is never advanced
//! on a failed cycle.

use std::collections::HashSet;
use std::sync::Arc;

use agtrace_core::{Clock, SeededRandom};
use agtrace_providers::{GenerateError, SourceAdapter};
use tokio::sync::Mutex;

use crate::config::OrchestratorConfig;
use crate::failures::FailureRecorder;
use crate::maintenance::{self, MaintenanceConfig};
use crate::pipeline::{IngestionPipeline, PipelineStats};

struct ManagedSource {
    adapter: Box<dyn SourceAdapter>,
    project_id: String,
}

/// Stats for a single sync cycle across every registered source.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CycleStats {
    pub sources_synced: usize,
    pub sources_failed: usize,
    pub events_ingested: usize,
    pub pipeline: PipelineStats,
    pub duration_ms: u64,
    /// Total retry attempts across every source this cycle, backoff and
    /// rate-limit retries alike.
    pub retry_count: u32,
}

/// Rolling stats across every cycle this orchestrator has run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrchestratorStats {
    pub cycles: u64,
    pub successful_cycles: u64,
    pub success_rate: f64,
    pub avg_duration_ms: f64,
}

pub struct Orchestrator {
    sources: Vec<ManagedSource>,
    store: Arc<Mutex<agtrace_index::EventStore>>,
    pipeline: IngestionPipeline,
    failures: FailureRecorder,
    config: OrchestratorConfig,
    maintenance: MaintenanceConfig,
    random: SeededRandom,
    clock: Arc<dyn Clock>,
    cycles: u64,
    successful_cycles: u64,
    total_duration_ms: u64,
}

impl Orchestrator {
    pub fn new(
        store: Arc<Mutex<agtrace_index::EventStore>>,
        pipeline: IngestionPipeline,
        config: OrchestratorConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let failures = FailureRecorder::new("orchestrator", clock.clone());
        Self {
            sources: Vec::new(),
            store,
            pipeline,
            failures,
            config,
            maintenance: MaintenanceConfig::default(),
            random: maintenance::default_random(),
            clock,
            cycles: 0,
            successful_cycles: 0,
            total_duration_ms: 0,
        }
    }

    /// Overrides the default analysis-sweep tunables. Kept as a setter
    /// rather than a `new` parameter so existing callers are unaffected.
    pub fn with_maintenance_config(mut self, config: MaintenanceConfig) -> Self {
        self.maintenance = config;
        self
    }

    pub fn register(&mut self, adapter: Box<dyn SourceAdapter>, project_id: impl Into<String>) {
        self.sources.push(ManagedSource {
            adapter,
            project_id: project_id.into(),
        });
    }

    /// Drop a registered source. Used by `reset_source` before
    /// re-registering a freshly constructed adapter with a clean cursor.
    pub fn remove_source(&mut self, source_id: &str) -> bool {
        let before = self.sources.len();
        self.sources.retain(|s| s.adapter.id() != source_id);
        self.sources.len() != before
    }

    pub fn stats(&self) -> OrchestratorStats {
        let success_rate = if self.cycles > 0 {
            self.successful_cycles as f64 / self.cycles as f64
        } else {
            0.0
        };
        let avg_duration_ms = if self.cycles > 0 {
            self.total_duration_ms as f64 / self.cycles as f64
        } else {
            0.0
        };
        OrchestratorStats {
            cycles: self.cycles,
            successful_cycles: self.successful_cycles,
            success_rate,
            avg_duration_ms,
        }
    }

    /// Run one sync cycle across every registered source, concurrently,
    /// flush through the pipeline, persist cursors, record failures. A
    /// source that errors out after `max_retries` attempts doesn't stop
    /// the others and doesn't poison the next cycle.
    pub async fn run_cycle(&mut self) -> CycleStats {
        self.run_matching(|_| true).await
    }

    /// Run a cycle scoped to a single source, identified by `source_id`.
    /// Sources that don't match sit out this cycle untouched.
    pub async fn run_source(&mut self, source_id: &str) -> CycleStats {
        self.run_matching(|id| id == source_id).await
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.adapter.id().to_string()).collect()
    }

    async fn run_matching(&mut self, predicate: impl Fn(&str) -> bool) -> CycleStats {
        let start = self.clock.now();
        let all = std::mem::take(&mut self.sources);
        let (managed, mut sitting_out): (Vec<_>, Vec<_>) =
            all.into_iter().partition(|s| predicate(s.adapter.id()));
        let config = self.config;

        let mut handles = Vec::with_capacity(managed.len());
        for source in managed {
            handles.push(tokio::spawn(run_source_with_retry(source, config)));
        }

        let mut sources_synced = 0;
        let mut sources_failed = 0;
        let mut events_ingested = 0;
        let mut retry_count = 0u32;
        let mut pipeline_stats = PipelineStats::default();
        let mut restored = Vec::with_capacity(handles.len());
        let mut touched_sessions: HashSet<(String, String)> = HashSet::new();
        let mut touched_projects: HashSet<String> = HashSet::new();

        for handle in handles {
            match handle.await {
                Ok((source, Ok(batch), retries)) => {
                    retry_count += retries;
                    sources_synced += 1;
                    events_ingested += batch.len();
                    for event in &batch {
                        touched_sessions.insert((event.project_id.clone(), event.session_id.clone()));
                    }
                    touched_projects.insert(source.project_id.clone());
                    let stats = self.pipeline.process_batch(batch).await;
                    pipeline_stats = merge_stats(pipeline_stats, stats);

                    if let Some(cursor) = source.adapter.cursor() {
                        let now = self.clock.now();
                        let store = self.store.lock().await;
                        if let Err(err) =
                            store.set_cursor(source.adapter.id(), &source.project_id, &cursor, now)
                        {
                            eprintln!(
                                "agtrace: failed to persist cursor for {}: {err}",
                                source.adapter.id()
                            );
                        }
                    }
                    restored.push(source);
                }
                Ok((source, Err(err), retries)) => {
                    retry_count += retries;
                    sources_failed += 1;
                    self.failures
                        .record_source_failure(&mut self.pipeline, source.adapter.id(), &err)
                        .await;
                    restored.push(source);
                }
                Err(join_err) => {
                    sources_failed += 1;
                    eprintln!("agtrace: source sync task panicked: {join_err}");
                }
            }
        }

        restored.append(&mut sitting_out);
        self.sources = restored;

        for (project_id, session_id) in &touched_sessions {
            if let Err(err) = maintenance::run_session_segmentation(
                &self.store,
                self.pipeline.embedder(),
                project_id,
                session_id,
                &self.maintenance.segmentation,
            )
            .await
            {
                eprintln!("agtrace: session segmentation failed for {project_id}/{session_id}: {err}");
            }
        }
        for project_id in &touched_projects {
            let now = self.clock.now();
            if let Err(err) =
                maintenance::run_lifecycle_sweep(&self.store, project_id, &self.maintenance.activation, now).await
            {
                eprintln!("agtrace: lifecycle sweep failed for {project_id}: {err}");
            }
            if let Err(err) =
                maintenance::run_community_detection(&self.store, project_id, &self.maintenance.leiden, &self.random)
                    .await
            {
                eprintln!("agtrace: community detection failed for {project_id}: {err}");
            }
        }

        let duration_ms = (self.clock.now() - start).num_milliseconds().max(0) as u64;

        self.cycles += 1;
        if sources_failed == 0 {
            self.successful_cycles += 1;
        }
        self.total_duration_ms += duration_ms;

        CycleStats {
            sources_synced,
            sources_failed,
            events_ingested,
            pipeline: pipeline_stats,
            duration_ms,
            retry_count,
        }
    }
}

/// Runs inside a dedicated task so one source's retry backoff never blocks
/// another's. Owns the adapter for the duration of the call and hands it
/// back regardless of outcome so the orchestrator can reuse it next cycle.
///
/// Reacts to `GenerateError`'s retry classification instead of retrying
/// every error identically: a `NonRetryable` failure returns immediately
/// with the cursor untouched, a `RateLimited` failure sleeps for the
/// provider-supplied delay without drawing down `max_retries` (bounded
/// separately by `max_rate_limit_retries` so a provider stuck reporting
/// 429 can't spin the task forever), and everything else uses the
/// existing exponential backoff budget.
async fn run_source_with_retry(
    mut source: ManagedSource,
    config: OrchestratorConfig,
) -> (ManagedSource, Result<Vec<agtrace_types::Event>, GenerateError>, u32) {
    let mut attempt = 0u32;
    let mut rate_limit_attempt = 0u32;
    let mut retry_count = 0u32;
    loop {
        match source.adapter.generate() {
            Ok(batch) => return (source, Ok(batch), retry_count),
            Err(err @ GenerateError::NonRetryable(_)) => {
                return (source, Err(err), retry_count);
            }
            Err(err @ GenerateError::RateLimited { .. }) => {
                if rate_limit_attempt >= config.max_rate_limit_retries {
                    return (source, Err(err), retry_count);
                }
                let retry_after_ms = match &err {
                    GenerateError::RateLimited { retry_after_ms, .. } => *retry_after_ms,
                    _ => unreachable!(),
                };
                tokio::time::sleep(std::time::Duration::from_millis(retry_after_ms)).await;
                rate_limit_attempt += 1;
                retry_count += 1;
            }
            Err(err @ GenerateError::Retryable(_)) => {
                if attempt >= config.max_retries {
                    return (source, Err(err), retry_count);
                }
                let delay = config.backoff_delay_ms(attempt);
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                attempt += 1;
                retry_count += 1;
            }
        }
    }
}

fn merge_stats(a: PipelineStats, b: PipelineStats) -> PipelineStats {
    PipelineStats {
        total: a.total + b.total,
        inserted: a.inserted + b.inserted,
        skipped_duplicate: a.skipped_duplicate + b.skipped_duplicate,
        skipped_existing: a.skipped_existing + b.skipped_existing,
        errors: a.errors + b.errors,
        duration_ms: a.duration_ms + b.duration_ms,
        throughput: a.throughput.max(b.throughput),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::embedding::NullEmbeddingProvider;
    use agtrace_core::SystemClock;
    use agtrace_types::{Cursor, Event, SourceKind};

    #[derive(Clone, Copy, PartialEq)]
    enum FlakyFailure {
        Retryable,
        NonRetryable,
        RateLimited,
    }

    struct FlakyAdapter {
        id: String,
        calls: std::sync::Mutex<u32>,
        fail_times: u32,
        fail_kind: FlakyFailure,
    }

    impl SourceAdapter for FlakyAdapter {
        fn id(&self) -> &str {
            &self.id
        }

        fn source_kind(&self) -> SourceKind {
            SourceKind::ApiLog
        }

        fn validate(&self) -> anyhow::Result<()> {
            Ok(())
        }

        fn generate(&mut self) -> Result<Vec<Event>, GenerateError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls <= self.fail_times {
                return Err(match self.fail_kind {
                    FlakyFailure::Retryable => {
                        GenerateError::Retryable(anyhow::anyhow!("simulated transient failure"))
                    }
                    FlakyFailure::NonRetryable => {
                        GenerateError::NonRetryable(anyhow::anyhow!("simulated permanent failure"))
                    }
                    FlakyFailure::RateLimited => GenerateError::RateLimited {
                        retry_after_ms: 1,
                        source: anyhow::anyhow!("simulated rate limit"),
                    },
                });
            }
            Ok(vec![Event::new(
                "proj-1",
                "sess-1",
                chrono::Utc::now(),
                "sync complete",
            )])
        }

        fn cursor(&self) -> Option<Cursor> {
            Some(Cursor::ApiLog { last_log_id: 1 })
        }

        fn restore_cursor(&mut self, _cursor: Cursor) {}
    }

    fn orchestrator() -> Orchestrator {
        let store = agtrace_index::EventStore::open_in_memory().unwrap();
        let store = Arc::new(Mutex::new(store));
        let pipeline = IngestionPipeline::new(
            store.clone(),
            Arc::new(NullEmbeddingProvider),
            Arc::new(SystemClock),
            PipelineConfig::default(),
        );
        Orchestrator::new(store, pipeline, OrchestratorConfig::default(), Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn a_source_that_eventually_succeeds_gets_synced() {
        let mut config = OrchestratorConfig::default();
        config.retry_base_ms = 1;
        config.retry_cap_ms = 1;
        let mut orchestrator = orchestrator();
        orchestrator.config = config;
        orchestrator.register(
            Box::new(FlakyAdapter {
                id: "src-1".into(),
                calls: std::sync::Mutex::new(0),
                fail_times: 2,
                fail_kind: FlakyFailure::Retryable,
            }),
            "proj-1",
        );

        let stats = orchestrator.run_cycle().await;
        assert_eq!(stats.sources_synced, 1);
        assert_eq!(stats.sources_failed, 0);
        assert_eq!(stats.events_ingested, 1);
        assert_eq!(stats.retry_count, 2);
        assert_eq!(orchestrator.stats().cycles, 1);
        assert_eq!(orchestrator.stats().successful_cycles, 1);
    }

    #[tokio::test]
    async fn a_source_that_never_recovers_is_recorded_as_failed() {
        let mut config = OrchestratorConfig::default();
        config.retry_base_ms = 1;
        config.retry_cap_ms = 1;
        config.max_retries = 1;
        let mut orchestrator = orchestrator();
        orchestrator.config = config;
        orchestrator.register(
            Box::new(FlakyAdapter {
                id: "src-down".into(),
                calls: std::sync::Mutex::new(0),
                fail_times: 99,
                fail_kind: FlakyFailure::Retryable,
            }),
            "proj-1",
        );

        let stats = orchestrator.run_cycle().await;
        assert_eq!(stats.sources_synced, 0);
        assert_eq!(stats.sources_failed, 1);
        // No source batch landed, but the failure recorder still wrote its
        // own system_error event straight through the pipeline.
        assert_eq!(stats.pipeline.inserted, 0);
        let failure_events = orchestrator
            .store
            .lock()
            .await
            .query_by_type("orchestrator", "system_error")
            .unwrap();
        assert_eq!(failure_events.len(), 1);
        assert_eq!(orchestrator.stats().successful_cycles, 0);
    }

    #[tokio::test]
    async fn a_synced_batch_runs_the_analysis_sweeps() {
        let mut orchestrator = orchestrator();
        orchestrator.register(
            Box::new(FlakyAdapter {
                id: "src-1".into(),
                calls: std::sync::Mutex::new(0),
                fail_times: 0,
                fail_kind: FlakyFailure::Retryable,
            }),
            "proj-1",
        );

        orchestrator.run_cycle().await;

        let store = orchestrator.store.lock().await;
        // Segmentation ran against the synced session and extracted its
        // entities into the graph tables that community detection reads.
        let entities = store.list_entities("proj-1").unwrap();
        assert!(!entities.is_empty());
    }

    #[tokio::test]
    async fn a_non_retryable_failure_is_not_retried() {
        let mut orchestrator = orchestrator();
        orchestrator.register(
            Box::new(FlakyAdapter {
                id: "src-bad-config".into(),
                calls: std::sync::Mutex::new(0),
                fail_times: 99,
                fail_kind: FlakyFailure::NonRetryable,
            }),
            "proj-1",
        );

        let stats = orchestrator.run_cycle().await;
        assert_eq!(stats.sources_failed, 1);
        assert_eq!(stats.retry_count, 0);
    }

    #[tokio::test]
    async fn a_rate_limited_source_retries_without_spending_the_retry_budget() {
        let mut config = OrchestratorConfig::default();
        config.max_retries = 0;
        let mut orchestrator = orchestrator();
        orchestrator.config = config;
        orchestrator.register(
            Box::new(FlakyAdapter {
                id: "src-throttled".into(),
                calls: std::sync::Mutex::new(0),
                fail_times: 2,
                fail_kind: FlakyFailure::RateLimited,
            }),
            "proj-1",
        );

        let stats = orchestrator.run_cycle().await;
        assert_eq!(stats.sources_synced, 1);
        assert_eq!(stats.sources_failed, 0);
        assert_eq!(stats.retry_count, 2);
    }
}
