use agtrace_types::{Cursor, Event, EventType, SourceKind};
use anyhow::Result;

use crate::fetcher::{classify_fetch_error, Fetcher, NullFetcher};
use crate::traits::{GenerateError, SourceAdapter};

/// Turns Slack channel messages into conversation events, cursoring on the
/// timestamp of the last message consumed.
pub struct SlackAdapter {
    source_id: String,
    project_id: String,
    channel: String,
    fetcher: Box<dyn Fetcher>,
    cursor: Option<Cursor>,
}

impl SlackAdapter {
    pub fn new(source_id: String, project_id: String, channel: String) -> Self {
        Self {
            source_id,
            project_id,
            channel,
            fetcher: Box::new(NullFetcher),
            cursor: None,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Box<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }
}

impl SourceAdapter for SlackAdapter {
    fn id(&self) -> &str {
        &self.source_id
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Slack
    }

    fn validate(&self) -> Result<()> {
        if self.channel.is_empty() {
            anyhow::bail!("slack source requires a channel");
        }
        Ok(())
    }

    fn generate(&mut self) -> Result<Vec<Event>, GenerateError> {
        let since = match &self.cursor {
            Some(Cursor::Slack { last_message_ts, .. }) => Some(last_message_ts.clone()),
            _ => None,
        };
        let page = self
            .fetcher
            .fetch(&format!("conversations.history:{}", self.channel), since.as_deref())
            .map_err(classify_fetch_error)?;
        let items = page.as_array().cloned().unwrap_or_default();

        let mut events = Vec::new();
        let mut latest_ts = since.unwrap_or_default();

        for item in items {
            let ts = item.get("ts").and_then(|v| v.as_str()).unwrap_or("0").to_string();
            let text = item.get("text").and_then(|v| v.as_str()).unwrap_or("").to_string();
            // Slack timestamps are "<unix_seconds>.<counter>"; string comparison
            // is correct here because both operands have the same fixed-width
            // fractional part within one channel's history.
            let epoch_seconds: f64 = ts.parse().unwrap_or(0.0);
            let timestamp = chrono::DateTime::from_timestamp(epoch_seconds as i64, 0)
                .unwrap_or_else(chrono::Utc::now);

            let mut event = Event::new(
                self.project_id.clone(),
                format!("slack:{}", self.channel),
                timestamp,
                text,
            );
            event.event_type = Some(EventType::Conversation);
            event.context.task = Some(format!("slack:{}", self.channel));

            if ts > latest_ts {
                latest_ts = ts;
            }
            events.push(event);
        }

        if !events.is_empty() {
            self.cursor = Some(Cursor::Slack {
                last_message_ts: latest_ts,
                last_channel: self.channel.clone(),
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
