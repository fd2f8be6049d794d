use crate::types::{ChunkMetadata, QueryResult};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// A named, cosine-bound collection keyed by chunk id.
///
/// Implementations own the embedding step: callers hand over raw texts.
pub trait VectorCollection: Send + Sync {
    fn name(&self) -> &str;

    /// Insert or replace entries by id. Returns the number of records written.
    fn upsert(&self, ids: &[String], texts: &[String], metadatas: &[ChunkMetadata]) -> anyhow::Result<usize>;

    /// Up to `n` nearest entries, closest first.
    fn query(&self, text: &str, n: usize) -> anyhow::Result<QueryResult>;

    fn count(&self) -> anyhow::Result<usize>;
}
