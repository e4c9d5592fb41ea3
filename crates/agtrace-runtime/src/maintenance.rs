//! Asynchronous sweepers over the event store: lifecycle tiering, episode
//! segmentation with entity/relation extraction, and community detection.
//! Unlike the ingestion pipeline, these don't run per incoming batch — the
//! orchestrator drives them per project/session after a cycle lands.

use std::sync::Arc;

use agtrace_core::{Random, SeededRandom};
use agtrace_engine::{
    activation, community, segmentation, ActivationConfig, LeidenConfig, SegmentationConfig,
    SweepStats,
};
use agtrace_index::EventStore;
use agtrace_types::{Community, CommunityHierarchy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::embedding::EmbeddingProvider;

/// Tunables for the three analysis sweeps, loaded the same way as
/// `PipelineConfig`/`OrchestratorConfig`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub activation: ActivationConfig,
    pub segmentation: SegmentationConfig,
    pub leiden: LeidenConfig,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            activation: ActivationConfig::default(),
            segmentation: SegmentationConfig::default(),
            leiden: LeidenConfig::default(),
        }
    }
}

/// Adapts the pipeline's fallible, batch-oriented `EmbeddingProvider` to
/// segmentation's infallible single-call `Embedder`: a provider error
/// degrades to the zero vector rather than aborting the sweep.
struct EngineEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
}

impl segmentation::Embedder for EngineEmbedder {
    fn embed(&self, content: &str) -> Vec<f32> {
        self.provider
            .embed(content)
            .unwrap_or_else(|_| vec![0.0; segmentation::EMBEDDING_DIM])
    }
}

/// Runs the activation/lifecycle sweep over every `active`/`session` event
/// in `project_id`, persisting the consolidate/archive transitions it finds.
/// Events left in the active tier are untouched.
pub async fn run_lifecycle_sweep(
    store: &Mutex<EventStore>,
    project_id: &str,
    config: &ActivationConfig,
    now: DateTime<Utc>,
) -> anyhow::Result<SweepStats> {
    let store = store.lock().await;
    let events = store.query_active(project_id)?;
    let result = activation::sweep(&events, now, config);

    for event in &result.to_consolidate {
        store.update_lifecycle(
            event.id,
            agtrace_types::LifecycleStatus::Consolidated,
            event.consolidation_score.max(0.5),
        )?;
    }
    for event in &result.to_archive {
        store.update_lifecycle(event.id, agtrace_types::LifecycleStatus::Archived, event.consolidation_score)?;
    }

    Ok(result.stats)
}

/// Segments one session's events into episodes, then extracts entities and
/// co-occurrence relations per episode and upserts them into the graph
/// tables community detection reads from.
pub async fn run_session_segmentation(
    store: &Mutex<EventStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    project_id: &str,
    session_id: &str,
    config: &SegmentationConfig,
) -> anyhow::Result<Vec<agtrace_types::Episode>> {
    let store = store.lock().await;
    let events = store.query_by_session(project_id, session_id)?;
    if events.is_empty() {
        return Ok(Vec::new());
    }

    let engine_embedder = EngineEmbedder { provider: embedder };
    let result = segmentation::segment_events(&events, &engine_embedder, config);
    let episodes = segmentation::build_episodes(&events, &result);

    for segment in &result.segments {
        let mut entity_ids = Vec::new();
        for &index in segment {
            let names = segmentation::extract_entities(&events[index]);
            for name in names {
                let id = store.upsert_entity(project_id, &name, "keyword")?;
                entity_ids.push(id);
            }
        }
        entity_ids.sort_unstable();
        entity_ids.dedup();
        for window in entity_ids.windows(2) {
            store.upsert_relation(window[0], window[1], 1.0)?;
        }
    }

    Ok(episodes)
}

/// Clusters the entity co-occurrence graph for `project_id` and persists
/// the resulting communities, replacing whatever was there before at level 0.
pub async fn run_community_detection(
    store: &Mutex<EventStore>,
    project_id: &str,
    config: &LeidenConfig,
    random: &SeededRandom,
) -> anyhow::Result<CommunityHierarchy> {
    let store = store.lock().await;
    let entities = store.list_entities(project_id)?;
    let relations = store.list_relations(project_id)?;

    let graph = community::build_graph(&relations);
    let partition = community::detect_communities(&graph, random, config);
    let communities: Vec<Community> = community::build_communities(&graph, &partition, &entities, project_id);

    store.save_communities(project_id, 0, &communities)?;
    Ok(community::build_hierarchy(&communities))
}

/// Shared seeded source for the Leiden local-moving phase. One per
/// orchestrator process, not per call, so repeated sweeps within a run
/// don't all restart from the same shuffle.
pub fn default_random() -> SeededRandom {
    SeededRandom::new(0xA6_7A_CE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::NullEmbeddingProvider;
    use agtrace_types::{Event, LifecycleStatus};
    use chrono::Duration;

    fn store_with(events: &[Event]) -> Mutex<EventStore> {
        let mut store = EventStore::open_in_memory().unwrap();
        store.batch_insert(events).unwrap();
        Mutex::new(store)
    }

    #[tokio::test]
    async fn lifecycle_sweep_archives_stale_unimportant_events() {
        let now = Utc::now();
        let mut event = Event::new("proj-1", "sess-1", now - Duration::days(40), "old note");
        event.last_activation = now - Duration::days(40);
        event.importance_score = 0.1;
        let store = store_with(&[event.clone()]);

        let stats = run_lifecycle_sweep(&store, "proj-1", &ActivationConfig::default(), now)
            .await
            .unwrap();
        assert_eq!(stats.archival_candidates, 1);

        let fetched = store.lock().await.get(event.id).unwrap().unwrap();
        assert_eq!(fetched.lifecycle_status, LifecycleStatus::Archived);
    }

    #[tokio::test]
    async fn segmentation_extracts_entities_into_relations() {
        let now = Utc::now();
        let events = vec![
            Event::new("proj-1", "sess-1", now, "hit an error during the build"),
            Event::new("proj-1", "sess-1", now + Duration::seconds(1), "fixed it, success"),
        ];
        let store = store_with(&events);

        run_session_segmentation(
            &store,
            Arc::new(NullEmbeddingProvider),
            "proj-1",
            "sess-1",
            &SegmentationConfig::default(),
        )
        .await
        .unwrap();

        let entities = store.lock().await.list_entities("proj-1").unwrap();
        assert!(entities.iter().any(|e| e.name == "error"));
        assert!(entities.iter().any(|e| e.name == "success"));
    }

    #[tokio::test]
    async fn community_detection_clusters_connected_entities() {
        let store = store_with(&[]);
        {
            let store = store.lock().await;
            let a = store.upsert_entity("proj-1", "error", "keyword").unwrap();
            let b = store.upsert_entity("proj-1", "success", "keyword").unwrap();
            store.upsert_relation(a, b, 1.0).unwrap();
        }

        let hierarchy = run_community_detection(&store, "proj-1", &LeidenConfig::default(), &default_random())
            .await
            .unwrap();
        assert!(!hierarchy.root_communities.is_empty());

        let saved = store.lock().await.list_communities("proj-1", 0).unwrap();
        assert_eq!(saved.len(), hierarchy.root_communities.len());
    }
}
