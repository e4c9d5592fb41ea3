use std::path::Path;

use agtrace_types::{hash_event, Cursor, Event};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::schema::init_schema;
use crate::Result;

/// Outcome of inserting a single event: either it was stored, or it matched
/// an existing content hash and was skipped (the existing id is returned).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(uuid::Uuid),
    Duplicate(uuid::Uuid),
}

/// SQLite-backed event store. Wraps a single `rusqlite::Connection`, one
/// per process, with `Arc<Mutex<_>>` used by callers that need to share it
/// across concurrent tasks.
pub struct EventStore {
    conn: Connection,
}

impl EventStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Insert one event inside its own transaction. Prefer `batch_insert` for
    /// more than a handful of events.
    pub fn insert(&mut self, event: &Event) -> Result<InsertOutcome> {
        let tx = self.conn.transaction()?;
        let outcome = insert_one(&tx, event)?;
        tx.commit()?;
        Ok(outcome)
    }

    /// Insert a batch inside one transaction, rolling back entirely if any
    /// row fails: a batch either lands whole or not at all.
    pub fn batch_insert(&mut self, events: &[Event]) -> Result<Vec<InsertOutcome>> {
        let tx = self.conn.transaction()?;
        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            outcomes.push(insert_one(&tx, event)?);
        }
        tx.commit()?;
        Ok(outcomes)
    }

    /// Insert a batch and, in the same transaction, write each inserted
    /// row's embedding into its side table. `embeddings[i]` is `None` when
    /// the enrich stage soft-skipped that event.
    pub fn batch_insert_with_embeddings(
        &mut self,
        events: &[Event],
        embeddings: &[Option<Vec<f32>>],
    ) -> Result<Vec<InsertOutcome>> {
        let tx = self.conn.transaction()?;
        let mut outcomes = Vec::with_capacity(events.len());
        for (event, embedding) in events.iter().zip(embeddings.iter()) {
            let outcome = insert_one(&tx, event)?;
            if let (InsertOutcome::Inserted(id), Some(vector)) = (&outcome, embedding) {
                let json = serde_json::to_string(vector).map_err(|e| {
                    crate::Error::Query(format!("embedding serialization failed: {e}"))
                })?;
                tx.execute(
                    "INSERT INTO event_embeddings (event_id, embedding_json) VALUES (?1, ?2)
                     ON CONFLICT(event_id) DO UPDATE SET embedding_json = excluded.embedding_json",
                    params![id.to_string(), json],
                )?;
            }
            outcomes.push(outcome);
        }
        tx.commit()?;
        Ok(outcomes)
    }

    pub fn get(&self, id: uuid::Uuid) -> Result<Option<Event>> {
        self.conn
            .query_row(
                "SELECT payload_json FROM events WHERE id = ?1",
                params![id.to_string()],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .map(|json| {
                let mut event: Event = serde_json::from_str(&json)
                    .map_err(|e| crate::Error::Query(format!("corrupt event row {id}: {e}")))?;
                agtrace_engine::evidence::repair_evidence_type(&mut event);
                Ok(event)
            })
            .transpose()
    }

    pub fn query_by_session(&self, project_id: &str, session_id: &str) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT payload_json FROM events WHERE project_id = ?1 AND session_id = ?2 ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map(params![project_id, session_id], |row| {
            row.get::<_, String>(0)
        })?;
        deserialize_rows(rows)
    }

    pub fn query_by_time(
        &self,
        project_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT payload_json FROM events WHERE project_id = ?1 AND timestamp >= ?2 AND timestamp <= ?3 ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map(
            params![project_id, from.to_rfc3339(), to.to_rfc3339()],
            |row| row.get::<_, String>(0),
        )?;
        deserialize_rows(rows)
    }

    /// Every event still eligible for the activation sweep: `active` or
    /// `session` tier. `consolidated`/`archived` events never re-enter it.
    pub fn query_active(&self, project_id: &str) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT payload_json FROM events WHERE project_id = ?1 AND lifecycle_status IN ('active', 'session') ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map(params![project_id], |row| row.get::<_, String>(0))?;
        deserialize_rows(rows)
    }

    pub fn query_by_type(&self, project_id: &str, event_type: &str) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT payload_json FROM events WHERE project_id = ?1 AND event_type = ?2 ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map(params![project_id, event_type], |row| {
            row.get::<_, String>(0)
        })?;
        deserialize_rows(rows)
    }

    /// Check which of the given content hashes already exist. Used by the
    /// pipeline's hash stage to decide whether to skip an event before it's
    /// ever inserted (cheaper than insert-then-detect-conflict).
    pub fn existing_hashes(&self, hashes: &[String]) -> Result<std::collections::HashSet<String>> {
        let mut found = std::collections::HashSet::new();
        for hash in hashes {
            let exists: Option<String> = self
                .conn
                .query_row(
                    "SELECT content_hash FROM event_hashes WHERE content_hash = ?1",
                    params![hash],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_some() {
                found.insert(hash.clone());
            }
        }
        Ok(found)
    }

    pub fn update_lifecycle(
        &self,
        id: uuid::Uuid,
        status: agtrace_types::LifecycleStatus,
        consolidation_score: f64,
    ) -> Result<()> {
        let status_str = serde_json::to_value(status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "active".to_string());
        self.conn.execute(
            "UPDATE events SET lifecycle_status = ?1, consolidation_score = ?2 WHERE id = ?3",
            params![status_str, consolidation_score, id.to_string()],
        )?;
        Ok(())
    }

    pub fn touch_activation(&self, id: uuid::Uuid, at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE events SET last_activation = ?1, activation_count = activation_count + 1 WHERE id = ?2",
            params![at.to_rfc3339(), id.to_string()],
        )?;
        Ok(())
    }

    pub fn write_embedding(&self, event_id: uuid::Uuid, embedding: &[f32]) -> Result<()> {
        let json = serde_json::to_string(embedding)
            .map_err(|e| crate::Error::Query(format!("embedding serialization failed: {e}")))?;
        self.conn.execute(
            "INSERT INTO event_embeddings (event_id, embedding_json) VALUES (?1, ?2)
             ON CONFLICT(event_id) DO UPDATE SET embedding_json = excluded.embedding_json",
            params![event_id.to_string(), json],
        )?;
        Ok(())
    }

    pub fn get_embedding(&self, event_id: uuid::Uuid) -> Result<Option<Vec<f32>>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT embedding_json FROM event_embeddings WHERE event_id = ?1",
                params![event_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| {
            serde_json::from_str(&j)
                .map_err(|e| crate::Error::Query(format!("corrupt embedding: {e}")))
        })
        .transpose()
    }

    pub fn get_cursor(&self, source_id: &str) -> Result<Option<Cursor>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT cursor_json FROM source_cursors WHERE source_id = ?1",
                params![source_id],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| {
            serde_json::from_str(&j).map_err(|e| crate::Error::Query(format!("corrupt cursor: {e}")))
        })
        .transpose()
    }

    pub fn set_cursor(
        &self,
        source_id: &str,
        project_id: &str,
        cursor: &Cursor,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let json = serde_json::to_string(cursor)
            .map_err(|e| crate::Error::Query(format!("cursor serialization failed: {e}")))?;
        self.conn.execute(
            "INSERT INTO source_cursors (source_id, project_id, cursor_json, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(source_id) DO UPDATE SET cursor_json = excluded.cursor_json, updated_at = excluded.updated_at",
            params![source_id, project_id, json, at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Drop a source's persisted cursor so the next sync resumes from
    /// scratch. Used by `reset_source` at the SDK boundary.
    pub fn delete_cursor(&self, source_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM source_cursors WHERE source_id = ?1",
            params![source_id],
        )?;
        Ok(())
    }

    /// Events recorded within `window` of each other whose content hashes
    /// differ but whose text is near-identical (normalized equality here;
    /// embedding-similarity dedup is left for a later iteration). Distinct
    /// from hash-exact dedup, which the pipeline handles before a row is
    /// ever written.
    pub fn find_near_duplicates(
        &self,
        project_id: &str,
        window: chrono::Duration,
    ) -> Result<Vec<(uuid::Uuid, uuid::Uuid)>> {
        let events = self.query_by_time(
            project_id,
            DateTime::<Utc>::MIN_UTC,
            Utc::now() + chrono::Duration::days(1),
        )?;
        let mut pairs = Vec::new();
        for (i, a) in events.iter().enumerate() {
            for b in &events[i + 1..] {
                if (b.timestamp - a.timestamp).abs() > window {
                    continue;
                }
                if normalize_text(&a.content) == normalize_text(&b.content) {
                    pairs.push((a.id, b.id));
                }
            }
        }
        Ok(pairs)
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn normalize_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn insert_one(tx: &rusqlite::Transaction<'_>, event: &Event) -> Result<InsertOutcome> {
    let content_hash = hash_event(event);

    let existing: Option<String> = tx
        .query_row(
            "SELECT event_id FROM event_hashes WHERE content_hash = ?1",
            params![content_hash],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(existing_id) = existing {
        let id = uuid::Uuid::parse_str(&existing_id)
            .map_err(|e| crate::Error::Query(format!("corrupt event_hashes row: {e}")))?;
        return Ok(InsertOutcome::Duplicate(id));
    }

    let payload_json = serde_json::to_string(event)
        .map_err(|e| crate::Error::Query(format!("event serialization failed: {e}")))?;
    let event_type = event
        .event_type
        .and_then(|t| serde_json::to_value(t).ok())
        .and_then(|v| v.as_str().map(str::to_string));
    let outcome = event
        .outcome
        .and_then(|o| serde_json::to_value(o).ok())
        .and_then(|v| v.as_str().map(str::to_string));
    let evidence_type = serde_json::to_value(event.evidence_type)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "observed".to_string());
    let lifecycle_status = serde_json::to_value(event.lifecycle_status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "active".to_string());

    tx.execute(
        "INSERT INTO events (
            id, project_id, session_id, timestamp, event_type, content, outcome,
            evidence_type, lifecycle_status, consolidation_score, last_activation,
            activation_count, importance_score, actionability_score,
            context_completeness_score, payload_json
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            event.id.to_string(),
            event.project_id,
            event.session_id,
            event.timestamp.to_rfc3339(),
            event_type,
            event.content,
            outcome,
            evidence_type,
            lifecycle_status,
            event.consolidation_score,
            event.last_activation.to_rfc3339(),
            event.activation_count,
            event.importance_score,
            event.actionability_score,
            event.context_completeness_score,
            payload_json,
        ],
    )?;

    tx.execute(
        "INSERT INTO event_hashes (content_hash, event_id) VALUES (?1, ?2)",
        params![content_hash, event.id.to_string()],
    )?;

    Ok(InsertOutcome::Inserted(event.id))
}

fn deserialize_rows(
    rows: impl Iterator<Item = rusqlite::Result<String>>,
) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    for row in rows {
        let json = row?;
        let mut event: Event = serde_json::from_str(&json)
            .map_err(|e| crate::Error::Query(format!("corrupt event row: {e}")))?;
        agtrace_engine::evidence::repair_evidence_type(&mut event);
        events.push(event);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agtrace_types::EventType;

    fn sample_event(content: &str) -> Event {
        Event::new("proj-1", "sess-1", Utc::now(), content)
    }

    #[test]
    fn insert_then_get_round_trips() {
        let mut store = EventStore::open_in_memory().unwrap();
        let mut event = sample_event("wrote a test");
        event.event_type = Some(EventType::Action);
        let outcome = store.insert(&event).unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted(event.id));

        let fetched = store.get(event.id).unwrap().unwrap();
        assert_eq!(fetched.content, "wrote a test");
    }

    #[test]
    fn duplicate_content_is_skipped() {
        let mut store = EventStore::open_in_memory().unwrap();
        let event = sample_event("same content");
        let mut duplicate = event.clone();
        duplicate.id = uuid::Uuid::new_v4();

        let first = store.insert(&event).unwrap();
        let second = store.insert(&duplicate).unwrap();
        assert_eq!(first, InsertOutcome::Inserted(event.id));
        assert_eq!(second, InsertOutcome::Duplicate(event.id));
    }

    #[test]
    fn batch_insert_is_atomic_with_itself() {
        let mut store = EventStore::open_in_memory().unwrap();
        let events: Vec<Event> = (0..5)
            .map(|i| sample_event(&format!("event {i}")))
            .collect();
        let outcomes = store.batch_insert(&events).unwrap();
        assert_eq!(outcomes.len(), 5);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, InsertOutcome::Inserted(_))));
    }

    #[test]
    fn cursor_round_trips() {
        let store = EventStore::open_in_memory().unwrap();
        let cursor = Cursor::Filesystem {
            last_commit_sha: "abc123".into(),
            branch: "main".into(),
        };
        store.set_cursor("fs-1", "proj-1", &cursor, Utc::now()).unwrap();
        let fetched = store.get_cursor("fs-1").unwrap().unwrap();
        assert_eq!(fetched, cursor);
    }

    #[test]
    fn query_by_session_orders_by_time() {
        let mut store = EventStore::open_in_memory().unwrap();
        let base = Utc::now();
        let mut earlier = sample_event("first");
        earlier.timestamp = base;
        let mut later = sample_event("second");
        later.timestamp = base + chrono::Duration::seconds(10);
        later.session_id = earlier.session_id.clone();

        store.insert(&later).unwrap();
        store.insert(&earlier).unwrap();

        let events = store.query_by_session("proj-1", &earlier.session_id).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].content, "first");
        assert_eq!(events[1].content, "second");
    }

    #[test]
    fn query_active_excludes_consolidated_and_archived() {
        let mut store = EventStore::open_in_memory().unwrap();
        let active = sample_event("still active");
        let mut archived = sample_event("long gone");
        archived.lifecycle_status = agtrace_types::LifecycleStatus::Archived;

        store.insert(&active).unwrap();
        store.insert(&archived).unwrap();

        let events = store.query_active("proj-1").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, active.id);
    }
}
