//! Six-stage ingestion pipeline: dedup, hash, decide, enrich, persist,
//! report. Each stage is a plain method so the stage boundaries stay
//! observable (and independently testable) rather than folding everything
//! into one loop.

use std::collections::HashSet;
use std::sync::Arc;

use agtrace_core::Clock;
use agtrace_types::{hash_event, Event};
use tokio::sync::Mutex;

use crate::config::PipelineConfig;
use crate::embedding::EmbeddingProvider;
use crate::lru::LruSet;

/// Outcome of running one batch through the pipeline. Every incoming event
/// is accounted for in exactly one of `inserted`/`skipped_duplicate`/
/// `skipped_existing`/`errors`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineStats {
    pub total: usize,
    pub inserted: usize,
    pub skipped_duplicate: usize,
    pub skipped_existing: usize,
    pub errors: usize,
    pub duration_ms: u64,
    pub throughput: f64,
}

/// The ingestion pipeline. Holds the store behind a `tokio::sync::Mutex`
/// since the orchestrator drives several sources concurrently against the
/// same index; the LRU and config are pipeline-local and need no locking.
pub struct IngestionPipeline {
    store: Arc<Mutex<agtrace_index::EventStore>>,
    embedder: Arc<dyn EmbeddingProvider>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
    lru: LruSet,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<Mutex<agtrace_index::EventStore>>,
        embedder: Arc<dyn EmbeddingProvider>,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
    ) -> Self {
        let lru = LruSet::new(config.lru_cache_size);
        Self {
            store,
            embedder,
            clock,
            config,
            lru,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Shared handle to the embedding collaborator, for sweepers that need
    /// to embed content outside the insert path (segmentation's semantic term).
    pub fn embedder(&self) -> Arc<dyn EmbeddingProvider> {
        self.embedder.clone()
    }

    /// Run a full batch through all six stages. Never returns an `Err`: a
    /// partial failure anywhere downstream of stage 1 shows up as a count
    /// in `PipelineStats::errors`, not as a propagated error, so one bad
    /// event can't sink an otherwise-good batch.
    pub async fn process_batch(&mut self, incoming: Vec<Event>) -> PipelineStats {
        let start = self.clock.now();
        let total = incoming.len();

        // Stage 1: in-memory dedup against the LRU and within the batch.
        let (survivors, skipped_duplicate) = self.dedup(incoming);

        // Stage 2: content hash for every survivor (folded into stage 1
        // above since the LRU lookup itself needs the hash; kept as a
        // named stage here for the contract, not a second pass).
        let hashes: Vec<String> = survivors.iter().map(|(_, h)| h.clone()).collect();

        // Stage 3: bulk existence check decides insert vs. skip.
        let existing = {
            let store = self.store.lock().await;
            store.existing_hashes(&hashes).unwrap_or_default()
        };
        let mut to_insert = Vec::with_capacity(survivors.len());
        let mut skipped_existing = 0;
        for (event, hash) in survivors {
            if existing.contains(&hash) {
                skipped_existing += 1;
            } else {
                to_insert.push((event, hash));
            }
        }

        // Stage 4: enrich via the embedding collaborator. A failure here is
        // a soft skip — the event is still persisted without a vector.
        tokio::task::yield_now().await;
        let contents: Vec<String> = to_insert.iter().map(|(e, _)| e.content.clone()).collect();
        let embeddings: Vec<Option<Vec<f32>>> = if contents.is_empty() {
            Vec::new()
        } else {
            match self.embedder.embed_batch(&contents) {
                Ok(vectors) => vectors.into_iter().map(Some).collect(),
                Err(_) => vec![None; contents.len()],
            }
        };

        // Stage 5: persist. Hashes and embeddings land in the same
        // transaction as the event rows.
        tokio::task::yield_now().await;
        let events: Vec<Event> = to_insert.into_iter().map(|(e, _)| e).collect();
        let mut errors = 0;
        let inserted_hashes: Vec<String> = if events.is_empty() {
            Vec::new()
        } else {
            let event_hashes: Vec<String> = events.iter().map(hash_event).collect();
            let mut store = self.store.lock().await;
            match store.batch_insert_with_embeddings(&events, &embeddings) {
                Ok(outcomes) => outcomes
                    .into_iter()
                    .zip(event_hashes)
                    .filter_map(|(outcome, hash)| match outcome {
                        agtrace_index::InsertOutcome::Inserted(_) => Some(hash),
                        agtrace_index::InsertOutcome::Duplicate(_) => None,
                    })
                    .collect(),
                Err(_) => {
                    errors += events.len();
                    Vec::new()
                }
            }
        };

        // Stage 6: report and clean up. The LRU only grows with hashes that
        // actually landed, so a batch that fails at stage 5 doesn't poison
        // future dedup decisions.
        let inserted = inserted_hashes.len();
        for hash in inserted_hashes {
            self.lru.insert(hash);
        }

        let duration_ms = (self.clock.now() - start).num_milliseconds().max(0) as u64;
        let throughput = if duration_ms > 0 {
            total as f64 / (duration_ms as f64 / 1000.0)
        } else {
            total as f64
        };

        PipelineStats {
            total,
            inserted,
            skipped_duplicate,
            skipped_existing,
            errors,
            duration_ms,
            throughput,
        }
    }

    fn dedup(&mut self, events: Vec<Event>) -> (Vec<(Event, String)>, usize) {
        let mut survivors = Vec::with_capacity(events.len());
        let mut batch_seen: HashSet<String> = HashSet::new();
        let mut skipped = 0;
        for event in events {
            let hash = hash_event(&event);
            if self.lru.contains(&hash) || !batch_seen.insert(hash.clone()) {
                skipped += 1;
                continue;
            }
            survivors.push((event, hash));
        }
        (survivors, skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agtrace_core::SystemClock;
    use chrono::Utc;

    struct StubEmbedder;
    impl EmbeddingProvider for StubEmbedder {
        fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![0.0; 4])
        }
    }

    fn pipeline() -> IngestionPipeline {
        let store = agtrace_index::EventStore::open_in_memory().unwrap();
        IngestionPipeline::new(
            Arc::new(Mutex::new(store)),
            Arc::new(StubEmbedder),
            Arc::new(SystemClock),
            PipelineConfig::default(),
        )
    }

    fn event(content: &str) -> Event {
        Event::new("proj-1", "sess-1", Utc::now(), content)
    }

    #[tokio::test]
    async fn inserts_fresh_events() {
        let mut pipeline = pipeline();
        let stats = pipeline.process_batch(vec![event("a"), event("b")]).await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.skipped_duplicate, 0);
        assert_eq!(stats.skipped_existing, 0);
    }

    #[tokio::test]
    async fn dedups_within_a_single_batch() {
        let mut pipeline = pipeline();
        let a = event("same content");
        let mut b = a.clone();
        b.id = uuid::Uuid::new_v4();
        let stats = pipeline.process_batch(vec![a, b]).await;
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.skipped_duplicate, 1);
    }

    #[tokio::test]
    async fn repeated_batches_are_idempotent() {
        let mut pipeline = pipeline();
        let events = vec![event("a"), event("b")];
        let first = pipeline.process_batch(events.clone()).await;
        let second = pipeline.process_batch(events).await;
        assert_eq!(first.inserted, 2);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped_duplicate, 2);
    }

    #[tokio::test]
    async fn a_cold_lru_still_catches_duplicates_via_the_store() {
        // Simulates a process restart: a fresh pipeline (cold LRU) sharing
        // the same store as one that already ingested this content. Stage
        // 3's existing_hashes lookup must catch it even with no LRU hit.
        let store = Arc::new(Mutex::new(agtrace_index::EventStore::open_in_memory().unwrap()));
        let mut first = IngestionPipeline::new(
            store.clone(),
            Arc::new(StubEmbedder),
            Arc::new(SystemClock),
            PipelineConfig::default(),
        );
        let a = event("shared content");
        let mut b = a.clone();
        b.id = uuid::Uuid::new_v4();
        first.process_batch(vec![a]).await;

        let mut second = IngestionPipeline::new(
            store,
            Arc::new(StubEmbedder),
            Arc::new(SystemClock),
            PipelineConfig::default(),
        );
        let stats = second.process_batch(vec![b]).await;
        assert_eq!(stats.inserted, 0);
        assert_eq!(stats.skipped_existing, 1);
    }
}
