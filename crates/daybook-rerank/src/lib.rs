//! Pairwise relevance reranking of retrieved hits.
//!
//! A [`PairScorer`] assigns one score per `(query, text)` pair, higher is
//! better for every backend. [`Reranker::rerank`] attaches the scores, sorts
//! stably in descending order and truncates.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tracing::{debug, info};

use daybook_core::config::{RerankBackendKind, RerankConfig};
use daybook_core::error::Error;
use daybook_core::types::Hit;

pub mod bge;
pub mod cross_encoder;

pub use bge::BgeScorer;
pub use cross_encoder::CrossEncoderScorer;

pub trait PairScorer: Send + Sync {
    fn predict(&self, query: &str, texts: &[String]) -> Result<Vec<f32>>;
}

pub struct Reranker {
    backend: RerankBackendKind,
    scorer: Box<dyn PairScorer>,
}

impl Reranker {
    pub fn new(backend: RerankBackendKind, scorer: Box<dyn PairScorer>) -> Self {
        Self { backend, scorer }
    }

    /// Load the configured backend from a local model directory.
    pub fn from_config(cfg: &RerankConfig, model_dir: Option<&Path>) -> Result<Self> {
        let dir = resolve_model_dir(cfg.backend, model_dir)?;
        info!(backend = %cfg.backend, dir = %dir.display(), "loading reranker");
        let scorer: Box<dyn PairScorer> = match cfg.backend {
            RerankBackendKind::CrossEncoder => Box::new(CrossEncoderScorer::load(&dir, cfg.max_length, &cfg.device)?),
            RerankBackendKind::Bge => Box::new(BgeScorer::load(&dir, cfg.max_length, &cfg.device)?),
        };
        Ok(Self::new(cfg.backend, scorer))
    }

    pub fn backend(&self) -> RerankBackendKind {
        self.backend
    }

    pub fn predict(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        self.scorer.predict(query, texts)
    }

    /// Score, attach, stable-sort descending, keep `min(top_k, len)`. `None` keeps all.
    pub fn rerank(&self, query: &str, hits: Vec<Hit>, top_k: Option<usize>) -> Result<Vec<Hit>> {
        if hits.is_empty() {
            return Ok(hits);
        }
        let texts: Vec<String> = hits.iter().map(|h| h.text.clone()).collect();
        let scores = self.scorer.predict(query, &texts)?;
        if scores.len() != hits.len() {
            return Err(anyhow!("reranker returned {} scores for {} hits", scores.len(), hits.len()));
        }
        let mut scored: Vec<Hit> = hits
            .into_iter()
            .zip(scores)
            .map(|(mut h, s)| {
                h.rerank_score = Some(if s.is_nan() { f32::NEG_INFINITY } else { s });
                h
            })
            .collect();
        scored.sort_by(|a, b| score_of(b).total_cmp(&score_of(a)));
        let keep = top_k.unwrap_or(scored.len()).min(scored.len());
        scored.truncate(keep);
        debug!(backend = %self.backend, kept = keep, "reranked");
        Ok(scored)
    }
}

fn score_of(h: &Hit) -> f32 {
    h.rerank_score.unwrap_or(f32::NEG_INFINITY)
}

/// The configured directory must exist; otherwise `models/<hub-name-tail>` is tried.
fn resolve_model_dir(backend: RerankBackendKind, configured: Option<&Path>) -> Result<PathBuf> {
    let candidate = match configured {
        Some(p) => p.to_path_buf(),
        None => {
            let tail = backend.default_model().rsplit('/').next().unwrap_or_default();
            Path::new("models").join(tail)
        }
    };
    if candidate.is_dir() {
        Ok(candidate)
    } else {
        Err(Error::InvalidConfig(format!(
            "reranker model directory {} not found (backend {backend}, expected a local copy of {})",
            candidate.display(),
            backend.default_model()
        ))
        .into())
    }
}
