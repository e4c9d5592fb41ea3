//! In-memory store and pipeline construction for tests that don't care
//! about a real workspace directory.

use std::sync::Arc;

use agtrace_core::{Clock, FakeClock};
use agtrace_runtime::{IngestionPipeline, PipelineConfig};
use chrono::Utc;
use tokio::sync::Mutex;

use crate::embedding::FakeEmbeddingProvider;

/// A fresh in-memory `EventStore` behind the `Arc<Mutex<_>>` every pipeline
/// and orchestrator collaborator expects.
pub fn in_memory_store() -> Arc<Mutex<agtrace_index::EventStore>> {
    Arc::new(Mutex::new(
        agtrace_index::EventStore::open_in_memory().expect("in-memory store opens cleanly"),
    ))
}

/// A pipeline over a fresh in-memory store, a `FakeEmbeddingProvider`, and
/// a `FakeClock` pinned to `Utc::now()` at call time. Returns the clock
/// alongside so the caller can advance it.
pub fn test_pipeline() -> (IngestionPipeline, Arc<FakeClock>) {
    let clock = Arc::new(FakeClock::new(Utc::now()));
    let pipeline = IngestionPipeline::new(
        in_memory_store(),
        Arc::new(FakeEmbeddingProvider::new()),
        clock.clone() as Arc<dyn Clock>,
        PipelineConfig::default(),
    );
    (pipeline, clock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event_sequence;

    #[tokio::test]
    async fn test_pipeline_ingests_synthetic_events() {
        let (mut pipeline, clock) = test_pipeline();
        let events = event_sequence("proj-1", "sess-1", clock.now(), "event", 5);
        let stats = pipeline.process_batch(events).await;
        assert_eq!(stats.inserted, 5);
    }
}
