use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Resolve the workspace data directory. Delegates to
/// `agtrace_core::path`, which both this crate and `agtrace-sdk` share,
/// so there's exactly one priority order (explicit path, then
/// `AGTRACE_MEMORY_PATH`, then the XDG data directory, then
/// `~/.agtrace-memory`) and one environment variable name.
pub fn resolve_workspace_path(explicit_path: Option<&str>) -> Result<PathBuf> {
    Ok(agtrace_core::path::resolve_workspace_path(explicit_path)?)
}

/// Tunables for the six-stage ingestion pipeline. A struct rather than
/// literals buried in function bodies: the declared thresholds must be
/// exposed, not just baked in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub max_batch_latency_ms: u64,
    pub lru_cache_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            max_batch_latency_ms: 200,
            lru_cache_size: 5000,
        }
    }
}

/// Tunables for the multi-source orchestrator: retry backoff and budget.
/// Backoff is base 1s, factor 2, capped at 10s.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub retry_cap_ms: u64,
    pub retry_factor: u32,
    /// Separate budget for `GenerateError::RateLimited` retries, which
    /// don't draw against `max_retries` since the source didn't fail —
    /// still bounded so a provider stuck reporting 429 forever can't spin
    /// a sync task indefinitely.
    pub max_rate_limit_retries: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_ms: 1000,
            retry_cap_ms: 10_000,
            retry_factor: 2,
            max_rate_limit_retries: 10,
        }
    }
}

impl OrchestratorConfig {
    /// Exponential backoff delay for the 0-indexed retry attempt:
    /// `base * factor^attempt`, capped at `retry_cap_ms`.
    pub fn backoff_delay_ms(&self, attempt: u32) -> u64 {
        let delay = self.retry_base_ms.saturating_mul(self.retry_factor.pow(attempt) as u64);
        delay.min(self.retry_cap_ms)
    }
}

/// Top-level runtime configuration, loaded from `config.toml` in the
/// workspace data directory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub orchestrator: OrchestratorConfig,
}

impl Config {
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(resolve_workspace_path(None)?.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn backoff_delay_grows_and_caps() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.backoff_delay_ms(0), 1000);
        assert_eq!(config.backoff_delay_ms(1), 2000);
        assert_eq!(config.backoff_delay_ms(2), 4000);
        assert_eq!(config.backoff_delay_ms(10), 10_000);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.pipeline.batch_size = 128;

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.pipeline.batch_size, 128);
    }

    #[test]
    fn load_nonexistent_returns_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.toml");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.pipeline.batch_size, PipelineConfig::default().batch_size);
    }
}
