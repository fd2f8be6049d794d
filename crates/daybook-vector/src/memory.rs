use std::sync::Mutex;

use anyhow::{anyhow, Result};

use daybook_core::traits::{Embedder, VectorCollection};
use daybook_core::types::{ChunkMetadata, QueryResult};

struct Entry {
    id: String,
    text: String,
    metadata: ChunkMetadata,
    vector: Vec<f32>,
}

/// Brute-force cosine collection held in memory. Insertion order is kept, so
/// equal distances come back in the order entries were first written.
pub struct MemoryCollection {
    name: String,
    embedder: Box<dyn Embedder>,
    entries: Mutex<Vec<Entry>>,
}

impl MemoryCollection {
    pub fn new(name: &str, embedder: Box<dyn Embedder>) -> Self {
        Self { name: name.to_string(), embedder, entries: Mutex::new(Vec::new()) }
    }
}

pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    1.0 - dot / (na * nb)
}

impl VectorCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn upsert(&self, ids: &[String], texts: &[String], metadatas: &[ChunkMetadata]) -> Result<usize> {
        if ids.len() != texts.len() || ids.len() != metadatas.len() {
            return Err(anyhow!("upsert arrays differ in length"));
        }
        let vectors = self.embedder.embed_batch(texts)?;
        let mut entries = self.entries.lock().map_err(|_| anyhow!("collection lock poisoned"))?;
        for (((id, text), metadata), vector) in ids.iter().zip(texts).zip(metadatas).zip(vectors) {
            let entry = Entry { id: id.clone(), text: text.clone(), metadata: metadata.clone(), vector };
            match entries.iter_mut().find(|e| e.id == *id) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }
        Ok(ids.len())
    }

    fn query(&self, text: &str, n: usize) -> Result<QueryResult> {
        let q = self
            .embedder
            .embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow!("embedder returned no vector"))?;
        let entries = self.entries.lock().map_err(|_| anyhow!("collection lock poisoned"))?;
        let mut scored: Vec<(f32, &Entry)> = entries.iter().map(|e| (cosine_distance(&q, &e.vector), e)).collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut out = QueryResult::default();
        for (distance, e) in scored.into_iter().take(n) {
            out.ids.push(e.id.clone());
            out.texts.push(e.text.clone());
            out.metadatas.push(e.metadata.clone());
            out.distances.push(distance);
        }
        Ok(out)
    }

    fn count(&self) -> Result<usize> {
        Ok(self.entries.lock().map_err(|_| anyhow!("collection lock poisoned"))?.len())
    }
}
