//! Synthetic `Event` generators for cross-crate integration tests —
//! sessions, working-memory and segmentation tests all need a stream of
//! events shaped a particular way without re-deriving the boilerplate in
//! every test module.

use agtrace_types::{Event, EventType, Outcome};
use chrono::{DateTime, Duration, Utc};

/// One event per minute starting at `start`, content `"{prefix} {i}"`.
/// Useful for activation/decay and segmentation tests that care about
/// relative spacing more than content.
pub fn event_sequence(project_id: &str, session_id: &str, start: DateTime<Utc>, prefix: &str, count: usize) -> Vec<Event> {
    (0..count)
        .map(|i| {
            let mut event = Event::new(project_id, session_id, start + Duration::minutes(i as i64), format!("{prefix} {i}"));
            event.last_activation = event.timestamp;
            event
        })
        .collect()
}

/// A single event with an explicit outcome, for activation/lifecycle
/// tests that need to control the success/failure bonus term.
pub fn event_with_outcome(project_id: &str, session_id: &str, at: DateTime<Utc>, content: &str, outcome: Outcome) -> Event {
    let mut event = Event::new(project_id, session_id, at, content);
    event.outcome = Some(outcome);
    event.last_activation = at;
    event
}

pub fn code_edit_event(project_id: &str, session_id: &str, at: DateTime<Utc>, file_path: &str) -> Event {
    let mut event = Event::new(project_id, session_id, at, format!("edited {file_path}"));
    event.event_type = Some(EventType::FileChange);
    event.files_changed = 1;
    event.last_activation = at;
    event
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_sequence_spaces_events_a_minute_apart() {
        let start = Utc::now();
        let events = event_sequence("proj-1", "sess-1", start, "event", 3);
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].timestamp - events[0].timestamp, Duration::minutes(1));
    }
}
