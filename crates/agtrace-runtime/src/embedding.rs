//! Embedding provider collaborator: `embed`/`embed_batch`. The core never
//! hosts or trains a model — production code injects a real implementation
//! at construction time rather than reaching for a lazily-loaded
//! process-global singleton.

use anyhow::Result;

pub const DEFAULT_EMBEDDING_DIM: usize = 384;

pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Default batched impl calls `embed` per item; real collaborators
    /// (an HTTP embedding service, a local model) override this to send
    /// one request for the whole batch.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// No embedding collaborator configured: the pipeline's enrich stage
/// treats this as a soft skip, persisting events without embeddings
/// rather than failing the batch.
pub struct NullEmbeddingProvider;

impl EmbeddingProvider for NullEmbeddingProvider {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.0; DEFAULT_EMBEDDING_DIM])
    }
}
