//! Public types for the SDK's operational surface: everything a caller
//! sees when listing, creating, and syncing sources, with no raw `Event`
//! ever crossing this boundary.

use agtrace_providers::SourceConfig;
pub use agtrace_types::SourceKind;

/// One registered source, as seen from outside the core.
#[derive(Debug, Clone)]
pub struct SourceSummary {
    pub source_id: String,
    pub project_id: String,
    pub kind: SourceKind,
}

/// Result of a `sync` call: aggregate counts only, never the events
/// themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SyncStats {
    pub sources_synced: usize,
    pub sources_failed: usize,
    pub events_ingested: usize,
    pub events_inserted: usize,
    pub events_skipped: usize,
    pub duration_ms: u64,
    pub retry_count: u32,
}

impl From<agtrace_runtime::CycleStats> for SyncStats {
    fn from(cycle: agtrace_runtime::CycleStats) -> Self {
        Self {
            sources_synced: cycle.sources_synced,
            sources_failed: cycle.sources_failed,
            events_ingested: cycle.events_ingested,
            events_inserted: cycle.pipeline.inserted,
            events_skipped: cycle.pipeline.skipped_duplicate + cycle.pipeline.skipped_existing,
            duration_ms: cycle.duration_ms,
            retry_count: cycle.retry_count,
        }
    }
}

/// Rolling status for a workspace's sync activity, backing `sync_status`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SyncStatus {
    pub cycles: u64,
    pub successful_cycles: u64,
    pub success_rate: f64,
    pub avg_duration_ms: f64,
}

impl From<agtrace_runtime::OrchestratorStats> for SyncStatus {
    fn from(stats: agtrace_runtime::OrchestratorStats) -> Self {
        Self {
            cycles: stats.cycles,
            successful_cycles: stats.successful_cycles,
            success_rate: stats.success_rate,
            avg_duration_ms: stats.avg_duration_ms,
        }
    }
}

/// Request shape for `create_source`. Distinct from `SourceConfig` so the
/// env-credential check (`environment_requirement`) lives at the SDK
/// boundary rather than inside the adapter factory.
#[derive(Debug, Clone)]
pub enum CreateSourceRequest {
    Filesystem {
        source_id: String,
        project_id: String,
        repo_path: std::path::PathBuf,
        branch: String,
    },
    Github {
        source_id: String,
        project_id: String,
        repo: String,
    },
    Slack {
        source_id: String,
        project_id: String,
        channel: String,
    },
    ApiLog {
        source_id: String,
        project_id: String,
        log_path: std::path::PathBuf,
    },
}

impl CreateSourceRequest {
    pub fn kind(&self) -> SourceKind {
        match self {
            CreateSourceRequest::Filesystem { .. } => SourceKind::Filesystem,
            CreateSourceRequest::Github { .. } => SourceKind::Github,
            CreateSourceRequest::Slack { .. } => SourceKind::Slack,
            CreateSourceRequest::ApiLog { .. } => SourceKind::ApiLog,
        }
    }

    pub fn project_id(&self) -> &str {
        match self {
            CreateSourceRequest::Filesystem { project_id, .. }
            | CreateSourceRequest::Github { project_id, .. }
            | CreateSourceRequest::Slack { project_id, .. }
            | CreateSourceRequest::ApiLog { project_id, .. } => project_id,
        }
    }

    pub(crate) fn into_source_config(self) -> SourceConfig {
        match self {
            CreateSourceRequest::Filesystem {
                source_id,
                project_id,
                repo_path,
                branch,
            } => SourceConfig::Filesystem {
                source_id,
                project_id,
                repo_path,
                branch,
            },
            CreateSourceRequest::Github {
                source_id,
                project_id,
                repo,
            } => SourceConfig::Github {
                source_id,
                project_id,
                repo,
            },
            CreateSourceRequest::Slack {
                source_id,
                project_id,
                channel,
            } => SourceConfig::Slack {
                source_id,
                project_id,
                channel,
            },
            CreateSourceRequest::ApiLog {
                source_id,
                project_id,
                log_path,
            } => SourceConfig::ApiLog {
                source_id,
                project_id,
                log_path,
            },
        }
    }
}

/// Name of the environment variable a credentialed source kind requires,
/// checked by `create_source` before the adapter is ever constructed.
/// Credentials travel through the environment, never as a parameter.
pub fn environment_requirement(kind: SourceKind) -> Option<&'static str> {
    match kind {
        SourceKind::Github => Some("AGTRACE_GITHUB_TOKEN"),
        SourceKind::Slack => Some("AGTRACE_SLACK_TOKEN"),
        SourceKind::Filesystem | SourceKind::ApiLog => None,
    }
}
