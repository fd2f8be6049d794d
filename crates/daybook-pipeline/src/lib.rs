//! Query, answer and draft flows over a collection.
//!
//! Retrieval and reranking errors propagate. Generation never fails: when no
//! backend answers, the sentinel text is returned untouched and the safety
//! and length passes are skipped.

use anyhow::Result;
use tracing::{debug, info};

use daybook_core::composer::ContextComposer;
use daybook_core::types::Hit;
use daybook_gen::{Generator, LengthEnforcer, LengthResolution, SafetyGate, SafetyResolution};
use daybook_rerank::Reranker;
use daybook_vector::Retriever;

pub mod store;
pub mod templates;

pub use store::{safe_topic, DraftArtifact, DraftStore, SavedDraft};
pub use templates::{fill, load_template, DEFAULT_DRAFT_TEMPLATE, QA_TEMPLATE};

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub hits: Vec<Hit>,
    /// `None` when generation fell back to the sentinel.
    pub safety: Option<SafetyResolution>,
}

#[derive(Debug, Clone)]
pub struct Draft {
    pub topic: String,
    pub text: String,
    pub hits: Vec<Hit>,
    pub safety: Option<SafetyResolution>,
    pub length: Option<LengthResolution>,
}

impl Draft {
    /// False when every backend failed and `text` is the sentinel.
    pub fn generated(&self) -> bool {
        self.safety.is_some()
    }
}

pub struct RagPipeline {
    retriever: Retriever,
    reranker: Option<Reranker>,
    rerank_top: Option<usize>,
    generator: Generator,
    safety: SafetyGate,
    length: LengthEnforcer,
}

impl RagPipeline {
    pub fn new(retriever: Retriever, generator: Generator) -> Self {
        Self {
            retriever,
            reranker: None,
            rerank_top: None,
            generator,
            safety: SafetyGate::new(),
            length: LengthEnforcer::new(300, 600),
        }
    }

    /// Rerank retrieved hits, keeping `top` of them (`k` when `None`).
    #[must_use]
    pub fn with_reranker(mut self, reranker: Reranker, top: Option<usize>) -> Self {
        self.reranker = Some(reranker);
        self.rerank_top = top;
        self
    }

    #[must_use]
    pub fn with_length(mut self, length: LengthEnforcer) -> Self {
        self.length = length;
        self
    }

    pub fn reranks(&self) -> bool {
        self.reranker.is_some()
    }

    pub fn search(&self, query: &str, k: usize) -> Result<Vec<Hit>> {
        let hits = self.retriever.query(query, k)?;
        match &self.reranker {
            Some(r) if !hits.is_empty() => {
                let top = self.rerank_top.unwrap_or(k);
                debug!(backend = %r.backend(), top, "reranking");
                r.rerank(query, hits, Some(top))
            }
            _ => Ok(hits),
        }
    }

    /// Safety gate only; answers are not length constrained.
    pub fn answer(&self, question: &str, k: usize) -> Result<Answer> {
        let hits = self.search(question, k)?;
        let context = ContextComposer::answer().render(&hits);
        let prompt = fill(QA_TEMPLATE, &[("question", question), ("context", &context)]);

        let generation = self.generator.generate(&prompt);
        if !generation.succeeded() {
            return Ok(Answer { text: generation.text, hits, safety: None });
        }
        let checked = self.safety.enforce(&self.generator, &prompt, generation.text);
        info!(safety = ?checked.resolution, hits = hits.len(), "answer ready");
        Ok(Answer { text: checked.text.trim().to_string(), hits, safety: Some(checked.resolution) })
    }

    /// Safety gate first, then length enforcement on its output.
    pub fn draft(&self, topic: &str, k: usize, template: &str) -> Result<Draft> {
        let hits = self.search(topic, k)?;
        let context = ContextComposer::draft(k).render(&hits);
        let prompt = fill(template, &[("topic", topic), ("context", &context)]);

        let generation = self.generator.generate(&prompt);
        if !generation.succeeded() {
            return Ok(Draft { topic: topic.to_string(), text: generation.text, hits, safety: None, length: None });
        }
        let checked = self.safety.enforce(&self.generator, &prompt, generation.text);
        let sized = self.length.enforce(&self.generator, &checked.prompt, &checked.text);
        info!(safety = ?checked.resolution, length = ?sized.resolution, "draft ready");
        Ok(Draft {
            topic: topic.to_string(),
            text: sized.text,
            hits,
            safety: Some(checked.resolution),
            length: Some(sized.resolution),
        })
    }
}
