use rusqlite::Connection;

use crate::Result;

// Schema version (increment when changing table definitions)
pub const SCHEMA_VERSION: i32 = 1;

// NOTE: Database Design Rationale
//
// Why one SQLite file per workspace, not one per project?
// - `project_id` is just a column; cross-project queries (community
//   detection over the whole corpus) stay a single query instead of a
//   fan-out across files.
//
// Why store the event JSON payload alongside typed columns?
// - `events.payload_json` carries the tagged `EventPayload` (code/test
//   detail) and the free-form `context` object verbatim; promoting every
//   field a future code-event type might need into its own column would
//   mean a migration per new event shape. The typed columns that do exist
//   (timestamp, event_type, lifecycle_status, activation fields) are the
//   ones every lifecycle/segmentation query filters or sorts on.
//
// Why a separate event_hashes table instead of a UNIQUE column on events?
// - Batch insert needs to check many hashes against existing rows before
//   deciding what to skip; a dedicated indexed table keeps that lookup a
//   single query instead of N point-lookups against the wider events table.

pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if current_version != SCHEMA_VERSION {
        drop_all_tables(conn)?;
    }

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT,
            content TEXT NOT NULL,
            outcome TEXT,
            evidence_type TEXT NOT NULL DEFAULT 'observed',
            lifecycle_status TEXT NOT NULL DEFAULT 'active',
            consolidation_score REAL NOT NULL DEFAULT 0.0,
            last_activation TEXT NOT NULL,
            activation_count INTEGER NOT NULL DEFAULT 0,
            importance_score REAL NOT NULL DEFAULT 0.5,
            actionability_score REAL NOT NULL DEFAULT 0.5,
            context_completeness_score REAL NOT NULL DEFAULT 0.5,
            payload_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS event_hashes (
            content_hash TEXT PRIMARY KEY,
            event_id TEXT NOT NULL,
            FOREIGN KEY (event_id) REFERENCES events(id)
        );

        CREATE TABLE IF NOT EXISTS event_embeddings (
            event_id TEXT PRIMARY KEY,
            embedding_json TEXT NOT NULL,
            FOREIGN KEY (event_id) REFERENCES events(id)
        );

        CREATE TABLE IF NOT EXISTS source_cursors (
            source_id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            cursor_json TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS entities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id TEXT NOT NULL,
            name TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            mention_count INTEGER NOT NULL DEFAULT 0,
            UNIQUE(project_id, name)
        );

        CREATE TABLE IF NOT EXISTS relations (
            source_entity_id INTEGER NOT NULL,
            target_entity_id INTEGER NOT NULL,
            weight REAL NOT NULL DEFAULT 1.0,
            PRIMARY KEY (source_entity_id, target_entity_id),
            FOREIGN KEY (source_entity_id) REFERENCES entities(id),
            FOREIGN KEY (target_entity_id) REFERENCES entities(id)
        );

        CREATE TABLE IF NOT EXISTS communities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id TEXT NOT NULL,
            level INTEGER NOT NULL DEFAULT 0,
            entity_ids_json TEXT NOT NULL,
            summary TEXT,
            density REAL NOT NULL DEFAULT 0.0,
            internal_edges INTEGER NOT NULL DEFAULT 0,
            external_edges INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_events_project_ts ON events(project_id, timestamp);
        CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id);
        CREATE INDEX IF NOT EXISTS idx_events_type ON events(project_id, event_type);
        CREATE INDEX IF NOT EXISTS idx_events_lifecycle ON events(project_id, lifecycle_status);
        CREATE INDEX IF NOT EXISTS idx_cursors_project ON source_cursors(project_id);
        CREATE INDEX IF NOT EXISTS idx_entities_project ON entities(project_id);
        CREATE INDEX IF NOT EXISTS idx_communities_project ON communities(project_id, level);
        "#,
    )?;

    conn.execute(&format!("PRAGMA user_version = {}", SCHEMA_VERSION), [])?;

    Ok(())
}

fn drop_all_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DROP TABLE IF EXISTS communities;
        DROP TABLE IF EXISTS relations;
        DROP TABLE IF EXISTS entities;
        DROP TABLE IF EXISTS source_cursors;
        DROP TABLE IF EXISTS event_embeddings;
        DROP TABLE IF EXISTS event_hashes;
        DROP TABLE IF EXISTS events;
        "#,
    )?;
    Ok(())
}
