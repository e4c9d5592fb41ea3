mod error;
mod graph_store;
mod schema;
mod store;

pub use error::{Error, Result};
pub use store::{EventStore, InsertOutcome};
