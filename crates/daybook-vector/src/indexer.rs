use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use daybook_core::records::read_jsonl;
use daybook_core::traits::VectorCollection;
use daybook_core::types::Chunk;

/// Writes chunks into a collection keyed by chunk id, in fixed-size batches.
pub struct Indexer {
    collection: Arc<dyn VectorCollection>,
    batch_size: usize,
    show_progress: bool,
}

impl Indexer {
    pub fn new(collection: Arc<dyn VectorCollection>, batch_size: usize) -> Self {
        Self { collection, batch_size: batch_size.max(1), show_progress: false }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn upsert(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            info!(collection = self.collection.name(), "no chunks to index");
            return Ok(0);
        }
        let pb = if self.show_progress {
            let pb = ProgressBar::new(chunks.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?
                    .progress_chars("#>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut written = 0usize;
        for batch in chunks.chunks(self.batch_size) {
            let ids: Vec<String> = batch.iter().map(|c| c.id.clone()).collect();
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let metadatas: Vec<_> = batch.iter().map(|c| c.metadata.clone()).collect();
            written += self.collection.upsert(&ids, &texts, &metadatas)?;
            pb.inc(batch.len() as u64);
        }
        pb.finish_with_message("done");
        info!(collection = self.collection.name(), written, "upsert complete");
        Ok(written)
    }

    /// Parse the whole file first; a malformed line aborts before anything is written.
    pub fn ingest_jsonl(&self, path: &Path) -> Result<usize> {
        let chunks = read_jsonl(path)?;
        self.upsert(&chunks)
    }
}
