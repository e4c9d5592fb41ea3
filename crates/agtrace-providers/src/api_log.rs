use std::fs;
use std::path::PathBuf;

use agtrace_types::{Cursor, Event, EventType, SourceKind};
use anyhow::Result;

use crate::traits::{GenerateError, SourceAdapter};

/// Turns a one-JSON-object-per-line log file into events, one event per
/// line, cursoring on line number. The simplest adapter shape: the cursor
/// is just the last line number consumed.
pub struct ApiLogAdapter {
    source_id: String,
    project_id: String,
    log_path: PathBuf,
    cursor: Option<Cursor>,
}

impl ApiLogAdapter {
    pub fn new(source_id: String, project_id: String, log_path: PathBuf) -> Self {
        Self {
            source_id,
            project_id,
            log_path,
            cursor: None,
        }
    }
}

impl SourceAdapter for ApiLogAdapter {
    fn id(&self) -> &str {
        &self.source_id
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::ApiLog
    }

    fn validate(&self) -> Result<()> {
        if !self.log_path.exists() {
            anyhow::bail!("api log {} does not exist", self.log_path.display());
        }
        Ok(())
    }

    fn generate(&mut self) -> Result<Vec<Event>, GenerateError> {
        let last_id = match &self.cursor {
            Some(Cursor::ApiLog { last_log_id }) => *last_log_id,
            _ => 0,
        };

        // A read failure here is usually transient (the log is being
        // rotated or briefly locked); a malformed line below is a
        // permanent data problem retrying won't fix.
        let contents = fs::read_to_string(&self.log_path).map_err(|err| {
            GenerateError::Retryable(anyhow::Error::new(err).context(format!("reading {}", self.log_path.display())))
        })?;

        let mut events = Vec::new();
        let mut max_id = last_id;

        for (line_no, line) in contents.lines().enumerate() {
            let log_id = (line_no + 1) as u64;
            if log_id <= last_id || line.trim().is_empty() {
                continue;
            }
            let record: serde_json::Value = serde_json::from_str(line).map_err(|err| {
                GenerateError::NonRetryable(
                    anyhow::Error::new(err).context(format!("parsing line {log_id} of {}", self.log_path.display())),
                )
            })?;

            let message = record
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or(line)
                .to_string();
            let timestamp = record
                .get("timestamp")
                .and_then(|v| v.as_str())
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_else(chrono::Utc::now);

            let mut event = Event::new(self.project_id.clone(), format!("api_log:{log_id}"), timestamp, message);
            event.event_type = Some(EventType::Action);
            event.source_id = Some(log_id.to_string());

            max_id = log_id;
            events.push(event);
        }

        if max_id > last_id {
            self.cursor = Some(Cursor::ApiLog { last_log_id: max_id });
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
    use std::io::Write;

    #[test]
    fn generate_skips_already_consumed_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"message": "first"}}"#).unwrap();
        writeln!(file, r#"{{"message": "second"}}"#).unwrap();

        let mut adapter = ApiLogAdapter::new("log-1".into(), "proj-1".into(), file.path().to_path_buf());
        let first_batch = adapter.generate().unwrap();
        assert_eq!(first_batch.len(), 2);

        writeln!(file, r#"{{"message": "third"}}"#).unwrap();
        let second_batch = adapter.generate().unwrap();
        assert_eq!(second_batch.len(), 1);
        assert_eq!(second_batch[0].content, "third");
    }
}
