use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Config(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Config(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// Resolve the substrate's workspace directory, in priority order:
/// 1. Explicit path (with tilde expansion)
/// 2. `AGTRACE_MEMORY_PATH` environment variable (with tilde expansion)
/// 3. System data directory
/// 4. `~/.agtrace-memory` (fallback for systems without a standard data directory)
pub fn resolve_workspace_path(explicit_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(expand_tilde(path));
    }

    if let Ok(env_path) = std::env::var("AGTRACE_MEMORY_PATH") {
        return Ok(expand_tilde(&env_path));
    }

    if let Some(data_dir) = dirs::data_dir() {
        return Ok(data_dir.join("agtrace-memory"));
    }

    if let Some(home) = std::env::var_os("HOME") {
        return Ok(PathBuf::from(home).join(".agtrace-memory"));
    }

    Err(Error::Config(
        "Could not determine workspace path: no HOME directory or system data directory found"
            .to_string(),
    ))
}

/// Expand tilde (~) in paths to the user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(stripped);
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins_over_everything() {
        let resolved = resolve_workspace_path(Some("/explicit/workspace")).unwrap();
        assert_eq!(resolved, PathBuf::from("/explicit/workspace"));
    }

    #[test]
    fn expand_tilde_resolves_to_home() {
        unsafe {
            std::env::set_var("HOME", "/home/tester");
        }
        assert_eq!(expand_tilde("~/agtrace"), PathBuf::from("/home/tester/agtrace"));
        assert_eq!(expand_tilde("/already/absolute"), PathBuf::from("/already/absolute"));
    }

    #[test]
    fn env_var_wins_over_system_default() {
        unsafe {
            std::env::set_var("AGTRACE_MEMORY_PATH", "/env/workspace");
        }
        let resolved = resolve_workspace_path(None).unwrap();
        unsafe {
            std::env::remove_var("AGTRACE_MEMORY_PATH");
        }
        assert_eq!(resolved, PathBuf::from("/env/workspace"));
    }
}
