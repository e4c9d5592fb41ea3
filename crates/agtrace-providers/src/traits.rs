use std::fmt;

use agtrace_types::{Cursor, Event, SourceKind};
use anyhow::Result;

/// How a `generate` failure should be handled by the caller driving retries.
///
/// Bare `anyhow::Error` gives no way to tell a permanent credential failure
/// from a flaky network blip from a provider asking for backoff, so every
/// caller retried every error identically. This is the discriminant that
/// lets a retry loop react differently per kind.
#[derive(Debug)]
pub enum GenerateError {
    /// Transient failure (I/O hiccup, flaky network). Retried with the
    /// caller's exponential backoff; counts against its retry budget.
    Retryable(anyhow::Error),
    /// Permanent failure (bad credentials, invalid config, malformed data).
    /// Reported immediately as a single-source error; never retried and the
    /// cursor is left untouched.
    NonRetryable(anyhow::Error),
    /// The provider asked the caller to back off for a specific duration
    /// (HTTP 429 / `Retry-After`). Retried after that delay; does not count
    /// against the retry budget since the failure isn't the source's fault.
    RateLimited { retry_after_ms: u64, source: anyhow::Error },
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::Retryable(err) => write!(f, "{err}"),
            GenerateError::NonRetryable(err) => write!(f, "{err}"),
            GenerateError::RateLimited { source, .. } => write!(f, "{source}"),
        }
    }
}

impl std::error::Error for GenerateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl From<anyhow::Error> for GenerateError {
    /// Default classification for an error with no more specific origin:
    /// retryable, since most ad hoc `anyhow::bail!`/`?` sites in an adapter
    /// are surfacing transient I/O rather than a permanent rejection.
    fn from(err: anyhow::Error) -> Self {
        GenerateError::Retryable(err)
    }
}

/// Uniform interface every source adapter implements.
///
/// `generate` is pull-based rather than push-based: the orchestrator calls
/// it once per sync cycle and gets back whatever new events are available
/// since the adapter's current cursor, with the cursor already advanced.
/// A single synchronous call callers can retry or schedule without holding
/// a generator alive across awaits.
pub trait SourceAdapter: Send {
    fn id(&self) -> &str;
    fn source_kind(&self) -> SourceKind;

    /// Cheap reachability/credential check, run before the first sync and
    /// whenever the orchestrator reopens a source after repeated failures.
    fn validate(&self) -> Result<()>;

    fn supports_incremental(&self) -> bool {
        true
    }

    /// Produce the next batch of events and advance the adapter's cursor.
    /// An adapter with no new activity returns an empty vector, not an error.
    fn generate(&mut self) -> Result<Vec<Event>, GenerateError>;

    fn cursor(&self) -> Option<Cursor>;
    fn restore_cursor(&mut self, cursor: Cursor);
}

/// Configuration needed to construct any adapter, tagged by source kind so
/// `SourceFactory::from_config` can match on it instead of consulting a
/// dynamic registry keyed by string.
#[derive(Debug, Clone)]
pub enum SourceConfig {
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

impl SourceConfig {
    pub fn source_id(&self) -> &str {
        match self {
            SourceConfig::Filesystem { source_id, .. }
            | SourceConfig::Github { source_id, .. }
            | SourceConfig::Slack { source_id, .. }
            | SourceConfig::ApiLog { source_id, .. } => source_id,
        }
    }
}

pub struct SourceFactory;

impl SourceFactory {
    /// Build a boxed adapter from a config. The `match` here is the
    /// registry: adding a source kind means adding a variant and an arm,
    /// both compiler-checked, rather than registering a class by string key.
    pub fn from_config(config: SourceConfig) -> Box<dyn SourceAdapter> {
        match config {
            SourceConfig::Filesystem {
                source_id,
                project_id,
                repo_path,
                branch,
            } => Box::new(crate::filesystem::FilesystemAdapter::new(
                source_id, project_id, repo_path, branch,
            )),
            SourceConfig::Github {
                source_id,
                project_id,
                repo,
            } => Box::new(crate::github::GithubAdapter::new(source_id, project_id, repo)),
            SourceConfig::Slack {
                source_id,
                project_id,
                channel,
            } => Box::new(crate::slack::SlackAdapter::new(source_id, project_id, channel)),
            SourceConfig::ApiLog {
                source_id,
                project_id,
                log_path,
            } => Box::new(crate::api_log::ApiLogAdapter::new(source_id, project_id, log_path)),
        }
    }
}
