//! Evidence-type repair: unknown or legacy `evidence_type` strings default
//! to `Observed` the first time a row is read back, rather than rejecting
//! the row outright.
//!
//! A bad enum value on read is repaired, not fatal. It never mutates the
//! event in place — callers (store reads, the lifecycle sweep) decide
//! whether the repair is worth persisting back.

use agtrace_types::{EvidenceType, Event};

/// Returns the evidence type an event should be treated as, repairing
/// `EvidenceType::Unknown` to `Observed`. Any other variant passes through
/// unchanged.
pub fn infer_evidence_type(event: &Event) -> EvidenceType {
    match event.evidence_type {
        EvidenceType::Unknown => EvidenceType::Observed,
        other => other,
    }
}

/// Applies [`infer_evidence_type`] in place, returning whether a repair
/// was actually made so the caller can decide to persist the change.
pub fn repair_evidence_type(event: &mut Event) -> bool {
    let repaired = infer_evidence_type(event);
    let changed = repaired != event.evidence_type;
    event.evidence_type = repaired;
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn unknown_evidence_is_repaired_to_observed() {
        let mut event = Event::new("proj", "sess", Utc::now(), "content");
        event.evidence_type = EvidenceType::Unknown;
        assert!(repair_evidence_type(&mut event));
        assert_eq!(event.evidence_type, EvidenceType::Observed);
    }

    #[test]
    fn known_evidence_is_left_alone() {
        let mut event = Event::new("proj", "sess", Utc::now(), "content");
        event.evidence_type = EvidenceType::Inferred;
        assert!(!repair_evidence_type(&mut event));
        assert_eq!(event.evidence_type, EvidenceType::Inferred);
    }
}
