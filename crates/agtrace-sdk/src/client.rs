use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use agtrace_core::{Clock, SystemClock};
use agtrace_providers::SourceFactory;
use agtrace_runtime::{Config, IngestionPipeline, NullEmbeddingProvider, Orchestrator};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{Error, Result};
use crate::types::{environment_requirement, CreateSourceRequest, SourceSummary, SyncStats, SyncStatus};

/// Facade over the pipeline/orchestrator/index layers. Holds its own
/// single-threaded `tokio` runtime so callers get a plain synchronous API —
/// the only place in this crate async shows up is internally, driving the
/// orchestrator's per-source tasks.
pub struct Client {
    runtime: tokio::runtime::Runtime,
    store: Arc<AsyncMutex<agtrace_index::EventStore>>,
    orchestrator: Mutex<Orchestrator>,
    sources: Mutex<HashMap<String, (SourceSummary, CreateSourceRequest)>>,
}

impl Client {
    /// Open (creating if needed) the workspace at `workspace_dir`.
    pub fn connect(workspace_dir: impl Into<PathBuf>) -> Result<Self> {
        let workspace_dir = workspace_dir.into();
        std::fs::create_dir_all(&workspace_dir).map_err(agtrace_runtime::Error::from)?;

        let store = agtrace_index::EventStore::open(workspace_dir.join("events.db"))?;
        let store = Arc::new(AsyncMutex::new(store));

        let config = Config::load_from(&workspace_dir.join("config.toml"))?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let pipeline = IngestionPipeline::new(
            store.clone(),
            Arc::new(NullEmbeddingProvider),
            clock.clone(),
            config.pipeline,
        );
        let orchestrator = Orchestrator::new(store.clone(), pipeline, config.orchestrator, clock);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(agtrace_runtime::Error::from)?;

        Ok(Self {
            runtime,
            store,
            orchestrator: Mutex::new(orchestrator),
            sources: Mutex::new(HashMap::new()),
        })
    }

    /// Open the default workspace (XDG data directory, or `AGTRACE_PATH`).
    pub fn connect_default() -> Result<Self> {
        Self::connect(agtrace_runtime::resolve_workspace_path(None)?)
    }

    pub fn list_sources(&self) -> Vec<SourceSummary> {
        self.sources
            .lock()
            .unwrap()
            .values()
            .map(|(summary, _)| summary.clone())
            .collect()
    }

    /// JSON schema for a source kind's config, for callers building a
    /// `create_source` request dynamically (a settings UI, a CLI prompt).
    pub fn source_config_schema(&self, kind: crate::types::SourceKind) -> serde_json::Value {
        use crate::types::SourceKind;
        let schema = match kind {
            SourceKind::Filesystem => schemars::schema_for!(FilesystemSchema),
            SourceKind::Github => schemars::schema_for!(GithubSchema),
            SourceKind::Slack => schemars::schema_for!(SlackSchema),
            SourceKind::ApiLog => schemars::schema_for!(ApiLogSchema),
        };
        serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
    }

    /// Register a new source. Credentialed kinds (GitHub, Slack) require
    /// their token in the environment; it's never accepted as a parameter.
    pub fn create_source(&self, request: CreateSourceRequest) -> Result<()> {
        let kind = request.kind();
        if let Some(var) = environment_requirement(kind) {
            if std::env::var(var).is_err() {
                return Err(Error::MissingCredential(var.to_string()));
            }
        }

        let source_id = match &request {
            CreateSourceRequest::Filesystem { source_id, .. }
            | CreateSourceRequest::Github { source_id, .. }
            | CreateSourceRequest::Slack { source_id, .. }
            | CreateSourceRequest::ApiLog { source_id, .. } => source_id.clone(),
        };
        let project_id = request.project_id().to_string();
        let summary = SourceSummary {
            source_id: source_id.clone(),
            project_id: project_id.clone(),
            kind,
        };

        let adapter = SourceFactory::from_config(request.clone().into_source_config());
        self.orchestrator.lock().unwrap().register(adapter, project_id);
        self.sources.lock().unwrap().insert(source_id, (summary, request));
        Ok(())
    }

    /// Sync one source (`Some(id)`) or every registered source (`None`).
    /// Returns aggregate counts only — never the ingested events.
    pub fn sync(&self, source_id: Option<&str>) -> Result<SyncStats> {
        let mut orchestrator = self.orchestrator.lock().unwrap();
        let cycle = self.runtime.block_on(async {
            match source_id {
                Some(id) => orchestrator.run_source(id).await,
                None => orchestrator.run_cycle().await,
            }
        });
        Ok(cycle.into())
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.orchestrator.lock().unwrap().stats().into()
    }

    /// Drop a source's persisted cursor and re-register it fresh, so the
    /// next sync starts over from the beginning.
    pub fn reset_source(&self, source_id: &str) -> Result<()> {
        let request = {
            let sources = self.sources.lock().unwrap();
            sources
                .get(source_id)
                .map(|(_, request)| request.clone())
                .ok_or_else(|| Error::NotFound(format!("source {source_id}")))?
        };

        self.runtime.block_on(async {
            self.store.lock().await.delete_cursor(source_id)
        })?;

        let mut orchestrator = self.orchestrator.lock().unwrap();
        orchestrator.remove_source(source_id);
        let project_id = request.project_id().to_string();
        let adapter = SourceFactory::from_config(request.into_source_config());
        orchestrator.register(adapter, project_id);
        Ok(())
    }
}

#[derive(schemars::JsonSchema)]
struct FilesystemSchema {
    source_id: String,
    project_id: String,
    repo_path: std::path::PathBuf,
    branch: String,
}

#[derive(schemars::JsonSchema)]
struct GithubSchema {
    source_id: String,
    project_id: String,
    repo: String,
}

#[derive(schemars::JsonSchema)]
struct SlackSchema {
    source_id: String,
    project_id: String,
    channel: String,
}

#[derive(schemars::JsonSchema)]
struct ApiLogSchema {
    source_id: String,
    project_id: String,
    log_path: std::path::PathBuf,
}
