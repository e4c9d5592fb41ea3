use serde::{Deserialize, Serialize};

/// Source adapter family, used both to pick a factory branch and to tag a
/// stored cursor so resuming a sync doesn't require probing the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Filesystem,
    Github,
    Slack,
    ApiLog,
}

/// Resume position for an incremental source sync.
///
/// Each variant's shape is the minimum needed to resume without re-scanning:
/// filesystem sources key off the last commit on a branch, GitHub and Slack
/// off event/message timestamps, and a raw API log off the last consumed
/// line id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source_kind", rename_all = "snake_case")]
pub enum Cursor {
    Filesystem {
        last_commit_sha: String,
        branch: String,
    },
    Github {
        last_event_ts: chrono::DateTime<chrono::Utc>,
    },
    Slack {
        last_message_ts: String,
        last_channel: String,
    },
    ApiLog {
        last_log_id: u64,
    },
}

impl Cursor {
    pub fn kind(&self) -> SourceKind {
        match self {
            Cursor::Filesystem { .. } => SourceKind::Filesystem,
            Cursor::Github { .. } => SourceKind::Github,
            Cursor::Slack { .. } => SourceKind::Slack,
            Cursor::ApiLog { .. } => SourceKind::ApiLog,
        }
    }
}
