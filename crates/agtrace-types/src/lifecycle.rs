use serde::{Deserialize, Serialize};

/// Coarse classification of an event's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Conversation,
    Action,
    Decision,
    Error,
    Success,
    FileChange,
    TestRun,
    Deployment,
    Refactoring,
    Debugging,
    SystemError,
}

/// Specialized classification for code-aware events, carried alongside `EventType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeEventType {
    CodeEdit,
    SymbolLookup,
    Refactoring,
    TestRun,
    BugDiscovery,
    PerfProfile,
    CodeReview,
    ArchDecision,
    DependencyChange,
    MergeConflict,
}

/// Outcome of an event, when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Partial,
    Ongoing,
}

/// Source of knowledge behind an event's content.
///
/// `Unknown` is never written by a source adapter; it exists only to absorb
/// legacy or malformed data on read, and the lifecycle sweep repairs it to
/// `Observed` the first time the event is touched (see `evidence::infer_evidence_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    #[default]
    Observed,
    Inferred,
    Deduced,
    Hypothetical,
    Learned,
    External,
    Unknown,
}

/// Tier in the working → session → archived lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    #[default]
    Active,
    Session,
    Consolidated,
    Archived,
}
