use agtrace_types::{Community, Entity, Relation};
use rusqlite::params;

use crate::store::EventStore;
use crate::Result;

/// Entity/relation/community persistence, kept in its own module rather
/// than folded into the main query surface.
impl EventStore {
    pub fn upsert_entity(&self, project_id: &str, name: &str, entity_type: &str) -> Result<i64> {
        self.connection().execute(
            "INSERT INTO entities (project_id, name, entity_type, mention_count) VALUES (?1, ?2, ?3, 1)
             ON CONFLICT(project_id, name) DO UPDATE SET mention_count = mention_count + 1",
            params![project_id, name, entity_type],
        )?;
        let id: i64 = self.connection().query_row(
            "SELECT id FROM entities WHERE project_id = ?1 AND name = ?2",
            params![project_id, name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn list_entities(&self, project_id: &str) -> Result<Vec<Entity>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, project_id, name, entity_type, mention_count FROM entities WHERE project_id = ?1",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok(Entity {
                id: row.get(0)?,
                project_id: row.get(1)?,
                name: row.get(2)?,
                entity_type: row.get(3)?,
                mention_count: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn upsert_relation(&self, source_id: i64, target_id: i64, weight_delta: f64) -> Result<()> {
        let (a, b) = if source_id <= target_id {
            (source_id, target_id)
        } else {
            (target_id, source_id)
        };
        self.connection().execute(
            "INSERT INTO relations (source_entity_id, target_entity_id, weight) VALUES (?1, ?2, ?3)
             ON CONFLICT(source_entity_id, target_entity_id) DO UPDATE SET weight = weight + excluded.weight",
            params![a, b, weight_delta],
        )?;
        Ok(())
    }

    pub fn list_relations(&self, project_id: &str) -> Result<Vec<Relation>> {
        let mut stmt = self.connection().prepare(
            "SELECT r.source_entity_id, r.target_entity_id, r.weight
             FROM relations r
             JOIN entities e ON e.id = r.source_entity_id
             WHERE e.project_id = ?1",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok(Relation {
                source_entity_id: row.get(0)?,
                target_entity_id: row.get(1)?,
                weight: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn save_communities(&self, project_id: &str, level: u32, communities: &[Community]) -> Result<()> {
        self.connection().execute(
            "DELETE FROM communities WHERE project_id = ?1 AND level = ?2",
            params![project_id, level],
        )?;
        for community in communities {
            let entity_ids_json = serde_json::to_string(&community.entity_ids)
                .map_err(|e| crate::Error::Query(format!("entity id serialization failed: {e}")))?;
            self.connection().execute(
                "INSERT INTO communities (project_id, level, entity_ids_json, summary, density, internal_edges, external_edges)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    project_id,
                    level,
                    entity_ids_json,
                    community.summary,
                    community.density,
                    community.internal_edges,
                    community.external_edges,
                ],
            )?;
        }
        Ok(())
    }

    pub fn list_communities(&self, project_id: &str, level: u32) -> Result<Vec<Community>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, entity_ids_json, summary, density, internal_edges, external_edges
             FROM communities WHERE project_id = ?1 AND level = ?2",
        )?;
        let entities = self.list_entities(project_id)?;
        let names_by_id: std::collections::HashMap<i64, String> =
            entities.into_iter().map(|e| (e.id, e.name)).collect();

        let rows = stmt.query_map(params![project_id, level], |row| {
            let id: i64 = row.get(0)?;
            let entity_ids_json: String = row.get(1)?;
            Ok((
                id,
                entity_ids_json,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, u32>(4)?,
                row.get::<_, u32>(5)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, entity_ids_json, summary, density, internal_edges, external_edges) = row?;
            let entity_ids: Vec<i64> = serde_json::from_str(&entity_ids_json)
                .map_err(|e| crate::Error::Query(format!("corrupt community row: {e}")))?;
            let entity_names = entity_ids
                .iter()
                .filter_map(|id| names_by_id.get(id).cloned())
                .collect();
            out.push(Community {
                id,
                project_id: project_id.to_string(),
                size: entity_ids.len(),
                entity_ids,
                entity_names,
                summary,
                level,
                density,
                internal_edges,
                external_edges,
            });
        }
        Ok(out)
    }
}
