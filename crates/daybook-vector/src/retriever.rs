use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use daybook_core::traits::VectorCollection;
use daybook_core::types::Hit;

/// Read-only nearest-neighbour lookup over one collection.
#[derive(Clone)]
pub struct Retriever {
    collection: Arc<dyn VectorCollection>,
}

impl Retriever {
    pub fn new(collection: Arc<dyn VectorCollection>) -> Self {
        Self { collection }
    }

    /// Exactly `k` neighbours are requested; ties keep the collection's order.
    pub fn query(&self, text: &str, k: usize) -> Result<Vec<Hit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut hits = self.collection.query(text, k)?.into_hits();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        debug!(collection = self.collection.name(), k, returned = hits.len(), "retrieved");
        Ok(hits)
    }
}
