use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A detected cluster of entities, one level of a `CommunityHierarchy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    pub id: i64,
    pub project_id: String,
    pub entity_ids: Vec<i64>,
    pub entity_names: Vec<String>,
    pub summary: Option<String>,
    pub level: u32,
    pub density: f64,
    pub size: usize,
    pub internal_edges: u32,
    pub external_edges: u32,
}

/// Multi-level view produced by repeated merge passes over the base partition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommunityHierarchy {
    pub root_communities: Vec<Community>,
    pub level_1_communities: Vec<Community>,
    pub level_2_communities: Vec<Community>,
    /// Maps a level-1 community id to the level-2 (or root) community id that absorbed it.
    pub parent_map: HashMap<i64, i64>,
}
