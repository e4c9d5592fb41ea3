use std::path::PathBuf;
use std::process::Command;

use agtrace_types::{Cursor, Event, EventType, SourceKind};
use anyhow::{bail, Result};
use chrono::{DateTime, TimeZone, Utc};

use crate::traits::{GenerateError, SourceAdapter};

/// Tracks commits on a branch of a local git repository, turning commit
/// metadata into code-edit events via `git log` shell-outs.
pub struct FilesystemAdapter {
    source_id: String,
    project_id: String,
    repo_path: PathBuf,
    branch: String,
    cursor: Option<Cursor>,
}

impl FilesystemAdapter {
    pub fn new(source_id: String, project_id: String, repo_path: PathBuf, branch: String) -> Self {
        Self {
            source_id,
            project_id,
            repo_path,
            branch,
            cursor: None,
        }
    }

    fn log_range(&self) -> String {
        match &self.cursor {
            Some(Cursor::Filesystem { last_commit_sha, .. }) => format!("{last_commit_sha}..HEAD"),
            _ => "HEAD".to_string(),
        }
    }
}

impl SourceAdapter for FilesystemAdapter {
    fn id(&self) -> &str {
        &self.source_id
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Filesystem
    }

    fn validate(&self) -> Result<()> {
        if !self.repo_path.join(".git").exists() {
            bail!("{} is not a git repository", self.repo_path.display());
        }
        Ok(())
    }

    fn generate(&mut self) -> Result<Vec<Event>, GenerateError> {
        let range = self.log_range();
        // Both failure modes here (git missing, or a bad revision range
        // after e.g. a force-push rewrites the last synced commit away)
        // are environment/config problems a retry can't fix.
        let output = Command::new("git")
            .args([
                "log",
                &range,
                "--pretty=format:%H%x1f%aI%x1f%an%x1f%s",
                "--name-only",
            ])
            .current_dir(&self.repo_path)
            .output()
            .map_err(|err| GenerateError::NonRetryable(anyhow::Error::new(err).context("failed to run git log")))?;
        if !output.status.success() {
            return Err(GenerateError::NonRetryable(anyhow::anyhow!(
                "git log failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut events = Vec::new();
        let mut last_sha = None;

        for block in stdout.split("\n\n").filter(|b| !b.trim().is_empty()) {
            let mut lines = block.lines();
            let header = match lines.next() {
                Some(h) => h,
                None => continue,
            };
            let mut fields = header.splitn(4, '\x1f');
            let (sha, iso_ts, author, subject) = match (
                fields.next(),
                fields.next(),
                fields.next(),
                fields.next(),
            ) {
                (Some(sha), Some(ts), Some(author), Some(subject)) => (sha, ts, author, subject),
                _ => continue,
            };
            let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(iso_ts)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc.timestamp_opt(0, 0).unwrap());
            let files: Vec<String> = lines.map(str::to_string).collect();

            let mut event = Event::new(
                self.project_id.clone(),
                format!("git:{}", self.branch),
                timestamp,
                subject.to_string(),
            );
            event.event_type = Some(EventType::FileChange);
            event.files_changed = files.len() as u32;
            event.context.files = files;
            event.context.branch = Some(self.branch.clone());
            event.payload = agtrace_types::EventPayload::Code(agtrace_types::CodeDetails {
                code_event_type: None,
                file_path: None,
                symbol_name: None,
                symbol_type: None,
                language: None,
                diff: None,
                git_commit: Some(sha.to_string()),
                git_author: Some(author.to_string()),
                performance_metrics: None,
                code_quality_score: None,
            });

            last_sha = Some(sha.to_string());
            events.push(event);
        }

        if let Some(sha) = last_sha {
            self.cursor = Some(Cursor::Filesystem {
                last_commit_sha: sha,
                branch: self.branch.clone(),
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
