use std::fmt;

/// Result type for agtrace-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the pipeline/config/store layer. Adapter retry
/// classification lives separately, in `agtrace_providers::GenerateError`
/// — `run_source_with_retry` inspects that directly and never lets a
/// source failure surface as this `Error` type.
#[derive(Debug)]
pub enum Error {
    /// Database/index layer error
    Index(agtrace_index::Error),

    /// An adapter's `validate()` rejected its config or credentials outright
    Provider(anyhow::Error),

    /// IO operation failed
    Io(std::io::Error),

    /// Configuration error
    Config(String),

    /// A source's config or credentials were rejected outright
    InvalidSource(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Index(err) => write!(f, "Index error: {}", err),
            Error::Provider(err) => write!(f, "Provider error: {}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::InvalidSource(msg) => write!(f, "Invalid source: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Index(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Provider(_) | Error::Config(_) | Error::InvalidSource(_) => None,
        }
    }
}

impl From<agtrace_index::Error> for Error {
    fn from(err: agtrace_index::Error) -> Self {
        Error::Index(err)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Provider(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<agtrace_core::path::Error> for Error {
    fn from(err: agtrace_core::path::Error) -> Self {
        match err {
            agtrace_core::path::Error::Io(io_err) => Error::Io(io_err),
            agtrace_core::path::Error::Config(msg) => Error::Config(msg),
        }
    }
}
