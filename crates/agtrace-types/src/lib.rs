mod community;
mod cursor;
mod episode;
mod error;
mod event;
mod hash;
mod lifecycle;

pub use community::{Community, CommunityHierarchy};
pub use cursor::{Cursor, SourceKind};
pub use episode::Episode;
pub use error::Error;
pub use event::{
    CodeDetails, Entity, Event, EventContext, EventPayload, Relation, TestDetails,
};
pub use hash::{hash_event, EXCLUDED_FIELDS};
pub use lifecycle::{CodeEventType, EventType, EvidenceType, LifecycleStatus, Outcome};
