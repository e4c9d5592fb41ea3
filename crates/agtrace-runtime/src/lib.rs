//! Ingestion pipeline, multi-source orchestrator and failure recorder.
//! This is the async layer above `agtrace-index`'s storage and
//! `agtrace-providers`'s source adapters: everything here either moves
//! events from a source into the index, or reacts when that fails.

pub mod config;
pub mod embedding;
pub mod error;
pub mod failures;
pub mod lru;
pub mod maintenance;
pub mod orchestrator;
pub mod pipeline;
pub mod schedule;

pub use config::{resolve_workspace_path, Config, OrchestratorConfig, PipelineConfig};
pub use embedding::{EmbeddingProvider, NullEmbeddingProvider, DEFAULT_EMBEDDING_DIM};
pub use error::{Error, Result};
pub use failures::{FailureRecorder, Severity};
pub use lru::LruSet;
pub use maintenance::MaintenanceConfig;
pub use orchestrator::{CycleStats, Orchestrator, OrchestratorStats};
pub use pipeline::{IngestionPipeline, PipelineStats};
pub use schedule::parse_schedule;
