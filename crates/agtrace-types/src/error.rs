use std::fmt;

/// Errors raised while constructing or validating core types, kept separate
/// from the `anyhow::Result` boundary used by crates that compose multiple
/// fallible collaborators.
#[derive(Debug)]
pub enum Error {
    InvalidCursor(String),
    InvalidScore { field: &'static str, value: f64 },
    EmptyContent,
    FutureTimestamp,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidCursor(msg) => write!(f, "invalid cursor: {msg}"),
            Error::InvalidScore { field, value } => {
                write!(f, "{field} must be within [0.0, 1.0], got {value}")
            }
            Error::EmptyContent => write!(f, "event content must not be empty"),
            Error::FutureTimestamp => write!(f, "event timestamp must not be in the future"),
        }
    }
}

impl std::error::Error for Error {}
