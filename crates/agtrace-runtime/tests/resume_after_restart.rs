//! S2: a source resumes from its last persisted cursor after the process
//! restarts, rather than re-ingesting everything from the start.

use std::io::Write;
use std::sync::Arc;

use agtrace_core::SystemClock;
use agtrace_providers::api_log::ApiLogAdapter;
use agtrace_providers::SourceAdapter;
use agtrace_runtime::{Config, IngestionPipeline, NullEmbeddingProvider, Orchestrator};
use tokio::sync::Mutex;

fn write_lines(path: &std::path::Path, lines: &[&str]) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
}

async fn build_orchestrator(db_path: &std::path::Path) -> Orchestrator {
    let store = agtrace_index::EventStore::open(db_path).unwrap();
    let store = Arc::new(Mutex::new(store));
    let config = Config::default();
    let clock = Arc::new(SystemClock);
    let pipeline = IngestionPipeline::new(
        store.clone(),
        Arc::new(NullEmbeddingProvider),
        clock.clone(),
        config.pipeline,
    );
    Orchestrator::new(store, pipeline, config.orchestrator, clock)
}

#[tokio::test]
async fn a_restarted_orchestrator_resumes_from_the_persisted_cursor() {
    let workspace = tempfile::tempdir().unwrap();
    let db_path = workspace.path().join("events.db");
    let log_path = workspace.path().join("api.jsonl");
    write_lines(&log_path, &[r#"{"message": "first"}"#, r#"{"message": "second"}"#]);

    {
        let mut orchestrator = build_orchestrator(&db_path).await;
        let adapter = ApiLogAdapter::new("log-1".into(), "proj-1".into(), log_path.clone());
        orchestrator.register(Box::new(adapter), "proj-1");
        let stats = orchestrator.run_cycle().await;
        assert_eq!(stats.pipeline.inserted, 2);
    }

    write_lines(&log_path, &[r#"{"message": "third"}"#]);

    {
        let mut orchestrator = build_orchestrator(&db_path).await;
        let mut adapter = ApiLogAdapter::new("log-1".into(), "proj-1".into(), log_path.clone());
        let store = agtrace_index::EventStore::open(&db_path).unwrap();
        if let Some(cursor) = store.get_cursor("log-1").unwrap() {
            adapter.restore_cursor(cursor);
        }
        orchestrator.register(Box::new(adapter), "proj-1");

        let stats = orchestrator.run_cycle().await;
        assert_eq!(stats.events_ingested, 1, "only the new line should be re-ingested");
        assert_eq!(stats.pipeline.inserted, 1);
    }
}
