//! Public SDK for the memory substrate's operational surface.
//!
//! `agtrace-sdk` is the only crate an external caller (a CLI, a hook
//! dispatcher, an MCP tool layer) talks to. It exposes exactly six
//! operations across that boundary — listing sources, describing their
//! config schema, creating one, syncing, checking sync status, and
//! resetting a source's cursor — and nothing that would leak a raw
//! `Event` across it.
//!
//! # Quickstart
//!
//! ```no_run
//! use agtrace_sdk::Client;
//! use agtrace_sdk::types::CreateSourceRequest;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::connect_default()?;
//! client.create_source(CreateSourceRequest::ApiLog {
//!     source_id: "local-log".into(),
//!     project_id: "proj-1".into(),
//!     log_path: "/var/log/agent.jsonl".into(),
//! })?;
//!
//! let stats = client.sync(None)?;
//! println!("ingested {} events", stats.events_ingested);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod types;

pub use client::Client;
pub use error::{Error, Result};
pub use types::{CreateSourceRequest, SourceKind, SourceSummary, SyncStats, SyncStatus};
