//! Domain types shared by the chunker, the vector collection and the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ChunkId = String;

/// A source file read from the corpus.
///
/// `path` is relative to the corpus root and always `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: String,
    pub text: String,
}

/// Metadata stored alongside every chunk.
///
/// `path`/`file`/`stem` are always present. Optional string extras such as
/// `title`, `day`, `section` or `heading` ride along in `extra` and are
/// preserved through ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub stem: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl ChunkMetadata {
    pub fn for_path(rel_path: &str) -> Self {
        let p = std::path::Path::new(rel_path);
        let file = p
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let stem = p
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self { path: rel_path.to_string(), file, stem, extra: BTreeMap::new() }
    }

    fn extra_nonempty(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str).filter(|v| !v.trim().is_empty())
    }

    /// Human label used when rendering context: `title`/`day` and
    /// `section`/`heading` joined with `" / "`. Empty when neither exists.
    pub fn label(&self) -> String {
        let primary = self.extra_nonempty("title").or_else(|| self.extra_nonempty("day"));
        let secondary = self.extra_nonempty("section").or_else(|| self.extra_nonempty("heading"));
        match (primary, secondary) {
            (Some(a), Some(b)) => format!("{a} / {b}"),
            (Some(a), None) | (None, Some(a)) => a.to_string(),
            (None, None) => String::new(),
        }
    }
}

/// A bounded segment of one document. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// One retrieved segment.
///
/// `distance` is the cosine distance reported by the collection (lower is
/// closer). `rerank_score` is set only after reranking, higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: ChunkId,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub distance: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

/// Raw answer of a collection query, as parallel arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub ids: Vec<ChunkId>,
    pub texts: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
    pub distances: Vec<f32>,
}

impl QueryResult {
    pub fn into_hits(self) -> Vec<Hit> {
        self.ids
            .into_iter()
            .zip(self.texts)
            .zip(self.metadatas)
            .zip(self.distances)
            .map(|(((id, text), metadata), distance)| Hit { id, text, metadata, distance, rerank_score: None })
            .collect()
    }
}
