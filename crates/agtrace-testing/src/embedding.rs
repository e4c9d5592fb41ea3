//! A deterministic stand-in for a real embedding collaborator, so tests
//! can assert on vectors without pulling in a model.

use agtrace_runtime::{EmbeddingProvider, DEFAULT_EMBEDDING_DIM};
use anyhow::Result;

/// Derives a fixed-length vector from the text's length and byte sum, so
/// the same input always embeds the same way and distinct inputs (almost
/// always) land at distinct points.
pub struct FakeEmbeddingProvider {
    dim: usize,
}

impl FakeEmbeddingProvider {
    pub fn new() -> Self {
        Self { dim: DEFAULT_EMBEDDING_DIM }
    }

    pub fn with_dim(dim: usize) -> Self {
        Self { dim }
    }
}

impl Default for FakeEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for FakeEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let seed = text.bytes().fold(0u32, |acc, b| acc.wrapping_add(b as u32));
        Ok((0..self.dim)
            .map(|i| ((seed.wrapping_add(i as u32) % 997) as f32) / 997.0)
            .collect())
    }
}

/// Always errors, for exercising the pipeline's soft-skip-on-failure path.
pub struct FailingEmbeddingProvider;

impl EmbeddingProvider for FailingEmbeddingProvider {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        anyhow::bail!("embedding collaborator unavailable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_embeds_identically() {
        let provider = FakeEmbeddingProvider::new();
        assert_eq!(provider.embed("hello").unwrap(), provider.embed("hello").unwrap());
    }

    #[test]
    fn different_text_embeds_differently() {
        let provider = FakeEmbeddingProvider::new();
        assert_ne!(provider.embed("hello").unwrap(), provider.embed("goodbye").unwrap());
    }
}
