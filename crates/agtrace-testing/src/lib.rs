//! In-process test helpers shared across the workspace's integration
//! tests: synthetic event generators, a deterministic embedding
//! collaborator, and in-memory store/pipeline builders. No process
//! spawning, no fixture directories on disk — everything here runs
//! inside the test binary.

pub mod builders;
pub mod embedding;
pub mod events;

pub use agtrace_core::FakeClock;
pub use builders::{in_memory_store, test_pipeline};
pub use embedding::{FailingEmbeddingProvider, FakeEmbeddingProvider};
pub use events::{code_edit_event, event_sequence, event_with_outcome};
