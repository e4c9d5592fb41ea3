use agtrace_types::{Cursor, Event, EventType, Outcome, SourceKind};
use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::fetcher::{classify_fetch_error, Fetcher, NullFetcher};
use crate::traits::{GenerateError, SourceAdapter};

/// Turns a GitHub push/PR/issue feed into events, one transform method per
/// resource kind. The actual HTTP call is behind `Fetcher`; see its doc comment.
pub struct GithubAdapter {
    source_id: String,
    project_id: String,
    repo: String,
    fetcher: Box<dyn Fetcher>,
    cursor: Option<Cursor>,
}

impl GithubAdapter {
    pub fn new(source_id: String, project_id: String, repo: String) -> Self {
        Self {
            source_id,
            project_id,
            repo,
            fetcher: Box::new(NullFetcher),
            cursor: None,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Box<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    fn since(&self) -> Option<String> {
        match &self.cursor {
            Some(Cursor::Github { last_event_ts }) => Some(last_event_ts.to_rfc3339()),
            _ => None,
        }
    }
}

impl SourceAdapter for GithubAdapter {
    fn id(&self) -> &str {
        &self.source_id
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Github
    }

    fn validate(&self) -> Result<()> {
        if self.repo.is_empty() {
            anyhow::bail!("github source requires a repo");
        }
        Ok(())
    }

    fn generate(&mut self) -> Result<Vec<Event>, GenerateError> {
        let since = self.since();
        let page = self
            .fetcher
            .fetch(&format!("repos/{}/events", self.repo), since.as_deref())
            .map_err(classify_fetch_error)?;
        let items = page.as_array().cloned().unwrap_or_default();

        let mut events = Vec::new();
        let mut latest_ts = match &self.cursor {
            Some(Cursor::Github { last_event_ts }) => *last_event_ts,
            _ => DateTime::<Utc>::MIN_UTC,
        };

        for item in items {
            let ts_str = item.get("created_at").and_then(|v| v.as_str()).unwrap_or("");
            let timestamp = DateTime::parse_from_rfc3339(ts_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(latest_ts);
            let event_kind = item.get("type").and_then(|v| v.as_str()).unwrap_or("push");
            let title = item
                .get("title")
                .or_else(|| item.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("github activity")
                .to_string();

            let mut event = Event::new(
                self.project_id.clone(),
                format!("github:{}", self.repo),
                timestamp,
                title,
            );
            event.event_type = Some(match event_kind {
                "pull_request" => EventType::Decision,
                "issue" => EventType::Decision,
                "release" => EventType::Deployment,
                _ => EventType::Action,
            });
            if let Some(state) = item.get("state").and_then(|v| v.as_str()) {
                event.outcome = match state {
                    "merged" | "closed" => Some(Outcome::Success),
                    "open" => Some(Outcome::Ongoing),
                    _ => None,
                };
            }

            if timestamp > latest_ts {
                latest_ts = timestamp;
            }
            events.push(event);
        }

        if !events.is_empty() {
            self.cursor = Some(Cursor::Github {
                last_event_ts: latest_ts,
            });
        }

        Ok(events)
    }

    fn cursor(&self) -> Option<Cursor> {
        self.cursor.clone()
    }

    fn restore_cursor(&mut self, cursor: Cursor) {
        self.cursor = Some(cursor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedFetcher(serde_json::Value);
    impl Fetcher for FixedFetcher {
        fn fetch(&mut self, _resource: &str, _since: Option<&str>) -> Result<serde_json::Value> {
            Ok(self.0.clone())
        }
    }

    struct RateLimitedFetcher;
    impl Fetcher for RateLimitedFetcher {
        fn fetch(&mut self, _resource: &str, _since: Option<&str>) -> Result<serde_json::Value> {
            Err(crate::fetcher::RateLimitError { retry_after_ms: 5000 }.into())
        }
    }

    #[test]
    fn a_rate_limited_fetch_is_classified_as_rate_limited_not_retryable() {
        let mut adapter = GithubAdapter::new("gh-1".into(), "proj-1".into(), "acme/widget".into())
            .with_fetcher(Box::new(RateLimitedFetcher));

        match adapter.generate() {
            Err(GenerateError::RateLimited { retry_after_ms, .. }) => {
                assert_eq!(retry_after_ms, 5000);
            }
            other => panic!("expected a rate-limited classification, got {other:?}"),
        }
    }

    #[test]
    fn generate_advances_cursor_to_latest_event() {
        let page = json!([
            {"type": "push", "created_at": "2026-01-01T00:00:00Z", "message": "initial commit"},
            {"type": "pull_request", "created_at": "2026-01-02T00:00:00Z", "title": "add feature", "state": "merged"},
        ]);
        let mut adapter = GithubAdapter::new("gh-1".into(), "proj-1".into(), "acme/widget".into())
            .with_fetcher(Box::new(FixedFetcher(page)));

        let events = adapter.generate().unwrap();
        assert_eq!(events.len(), 2);
        match adapter.cursor() {
            Some(Cursor::Github { last_event_ts }) => {
                assert_eq!(last_event_ts.to_rfc3339(), "2026-01-02T00:00:00+00:00");
            }
            other => panic!("expected github cursor, got {other:?}"),
        }
    }
}
