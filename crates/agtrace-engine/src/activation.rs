//! ACT-R style activation scoring and memory tier transitions.
//!
//! Not claimed to be psychologically realistic — borrows the base-level
//! decay shape from ACT-R because it gives a principled recency/frequency
//! curve, nothing more.

use agtrace_types::{Event, LifecycleStatus, Outcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Working memory holds at most this many active events at once
/// (Baddeley's 7±2; we pick the upper bound).
pub const WORKING_MEMORY_CAPACITY: usize = 9;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationConfig {
    pub decay_rate: f64,
    pub high_importance_boost: f64,
    pub consolidation_days: i64,
    pub archive_days: i64,
    pub archive_importance_threshold: f64,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.5,
            high_importance_boost: 1.5,
            consolidation_days: 7,
            archive_days: 30,
            archive_importance_threshold: 0.3,
        }
    }
}

/// Activation = base-level decay + frequency + consolidation + importance
/// + actionability + success boosts, floored at 0. Consolidated and
/// archived events never re-enter working memory, so they score 0.
pub fn compute_activation(event: &Event, now: DateTime<Utc>, config: &ActivationConfig) -> f64 {
    if matches!(
        event.lifecycle_status,
        LifecycleStatus::Consolidated | LifecycleStatus::Archived
    ) {
        return 0.0;
    }

    let hours_since_access = (now - event.last_activation).num_seconds() as f64 / 3600.0;
    let hours_since_access = hours_since_access.max(0.1);

    let base_level = -config.decay_rate * hours_since_access.ln();
    let frequency_bonus = (event.activation_count.max(1) as f64).ln() * 0.1;
    let consolidation_add = event.consolidation_score;
    let importance_add = if event.importance_score > 0.7 {
        config.high_importance_boost
    } else {
        0.0
    };
    let actionability_add = if event.has_next_step || event.actionability_score > 0.7 {
        1.0
    } else {
        0.0
    };
    let success_add = if event.outcome == Some(Outcome::Success) {
        0.5
    } else {
        0.0
    };

    let total =
        base_level + frequency_bonus + consolidation_add + importance_add + actionability_add + success_add;
    total.max(0.0)
}

/// Eligible for consolidation: not already consolidated/archived, old
/// enough, and accessed at least once. Eligibility does not itself
/// consolidate — the pattern-extraction sweep writes the consolidation
/// score and flips the status.
pub fn should_consolidate(event: &Event, now: DateTime<Utc>, config: &ActivationConfig) -> bool {
    if event.lifecycle_status != LifecycleStatus::Active && event.lifecycle_status != LifecycleStatus::Session {
        return false;
    }
    let age_days = (now - event.timestamp).num_days();
    if age_days < config.consolidation_days {
        return false;
    }
    event.activation_count > 0
}

/// Eligible for archival: old, unimportant, and not recently touched.
pub fn should_archive(event: &Event, now: DateTime<Utc>, config: &ActivationConfig) -> bool {
    if event.lifecycle_status == LifecycleStatus::Archived {
        return false;
    }
    let age_days = (now - event.timestamp).num_days();
    if age_days < config.archive_days {
        return false;
    }
    if event.importance_score >= config.archive_importance_threshold {
        return false;
    }
    let days_since_access = (now - event.last_activation).num_days();
    days_since_access >= 7
}

#[derive(Debug, Default)]
pub struct SweepStats {
    pub total_processed: usize,
    pub consolidation_candidates: usize,
    pub archival_candidates: usize,
    pub remaining_active: usize,
}

#[derive(Debug, Default)]
pub struct SweepResult<'a> {
    pub to_consolidate: Vec<&'a Event>,
    pub to_archive: Vec<&'a Event>,
    pub keep_active: Vec<&'a Event>,
    pub stats: SweepStats,
}

/// Pure lifecycle sweep: classifies events into consolidation/archival/keep
/// buckets. The caller applies the resulting status transitions through the
/// event store; this function never mutates anything.
pub fn sweep<'a>(events: &'a [Event], now: DateTime<Utc>, config: &ActivationConfig) -> SweepResult<'a> {
    let mut result = SweepResult::default();
    result.stats.total_processed = events.len();

    for event in events {
        if matches!(
            event.lifecycle_status,
            LifecycleStatus::Consolidated | LifecycleStatus::Archived
        ) {
            continue;
        }
        if should_consolidate(event, now, config) {
            result.to_consolidate.push(event);
        } else if should_archive(event, now, config) {
            result.to_archive.push(event);
        } else {
            result.keep_active.push(event);
        }
    }

    result.stats.consolidation_candidates = result.to_consolidate.len();
    result.stats.archival_candidates = result.to_archive.len();
    result.stats.remaining_active = result.keep_active.len();
    result
}

/// Ranks events by activation, descending. Used both for retrieval ranking
/// and to find demotion candidates when working memory overflows.
pub fn rank_by_activation<'a>(
    events: &'a [Event],
    now: DateTime<Utc>,
    config: &ActivationConfig,
) -> Vec<(&'a Event, f64)> {
    let mut scored: Vec<(&Event, f64)> = events
        .iter()
        .map(|e| (e, compute_activation(e, now, config)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

/// Given the currently-active events, returns the ids that must demote to
/// `session` to bring working memory back under [`WORKING_MEMORY_CAPACITY`].
/// Demotes the lowest-activation events first.
pub fn overflow_demotions(
    active_events: &[Event],
    now: DateTime<Utc>,
    config: &ActivationConfig,
) -> Vec<uuid::Uuid> {
    if active_events.len() <= WORKING_MEMORY_CAPACITY {
        return Vec::new();
    }
    let ranked = rank_by_activation(active_events, now, config);
    ranked[WORKING_MEMORY_CAPACITY..]
        .iter()
        .map(|(e, _)| e.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fresh_event(now: DateTime<Utc>) -> Event {
        Event::new("proj", "sess", now, "did a thing")
    }

    #[test]
    fn consolidated_events_score_zero() {
        let now = Utc::now();
        let mut event = fresh_event(now);
        event.lifecycle_status = LifecycleStatus::Consolidated;
        assert_eq!(compute_activation(&event, now, &ActivationConfig::default()), 0.0);
    }

    #[test]
    fn high_importance_events_score_higher() {
        let now = Utc::now();
        let config = ActivationConfig::default();
        let mut plain = fresh_event(now);
        plain.last_activation = now - Duration::hours(2);
        let mut important = plain.clone();
        important.importance_score = 0.9;

        assert!(compute_activation(&important, now, &config) > compute_activation(&plain, now, &config));
    }

    #[test]
    fn stale_unimportant_event_is_archived() {
        let now = Utc::now();
        let config = ActivationConfig::default();
        let mut event = fresh_event(now - Duration::days(40));
        event.last_activation = now - Duration::days(40);
        event.importance_score = 0.1;
        assert!(should_archive(&event, now, &config));
        assert!(!should_consolidate(&event, now, &config));
    }

    #[test]
    fn accessed_old_event_is_consolidation_eligible() {
        let now = Utc::now();
        let config = ActivationConfig::default();
        let mut event = fresh_event(now - Duration::days(10));
        event.activation_count = 3;
        assert!(should_consolidate(&event, now, &config));
    }

    #[test]
    fn overflow_demotes_lowest_activation_first() {
        let now = Utc::now();
        let config = ActivationConfig::default();
        let events: Vec<Event> = (0..12)
            .map(|i| {
                let mut e = fresh_event(now);
                e.last_activation = now - Duration::hours(i);
                e
            })
            .collect();
        let demoted = overflow_demotions(&events, now, &config);
        assert_eq!(demoted.len(), 12 - WORKING_MEMORY_CAPACITY);
    }
}
