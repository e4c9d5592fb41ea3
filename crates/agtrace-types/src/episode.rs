use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A contiguous run of events between two surprise-detected boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: Uuid,
    pub project_id: String,
    pub session_id: String,
    pub event_ids: Vec<Uuid>,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    /// Mean composite surprise score of the events inside this episode,
    /// excluding the boundary event itself (which by construction scored
    /// above threshold).
    pub mean_surprise: f64,
}

impl Episode {
    pub fn event_count(&self) -> usize {
        self.event_ids.len()
    }
}
