use std::fs;
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use daybook_core::config::RerankBackendKind;
use daybook_core::types::{Chunk, ChunkMetadata};
use daybook_embed::FakeEmbedder;
use daybook_gen::mock::ScriptedBackend;
use daybook_gen::{Generator, LengthEnforcer, LengthResolution, SafetyResolution, NO_BACKEND_SENTINEL};
use daybook_pipeline::{DraftArtifact, DraftStore, RagPipeline, DEFAULT_DRAFT_TEMPLATE};
use daybook_rerank::{PairScorer, Reranker};
use daybook_vector::{Indexer, MemoryCollection, Retriever};

fn chunk(path: &str, idx: usize, text: &str, title: &str) -> Chunk {
    let mut metadata = ChunkMetadata::for_path(path);
    metadata.extra.insert("title".into(), title.into());
    Chunk { id: format!("{path}::{idx}::test"), text: text.into(), metadata }
}

fn retriever() -> Result<Retriever> {
    let collection = Arc::new(MemoryCollection::new("days_collection", Box::new(FakeEmbedder::new(128))));
    let indexer = Indexer::new(collection.clone(), 2);
    indexer.upsert(&[
        chunk("days/2024-01-01.md", 0, "rust borrow checker lifetimes", "元日"),
        chunk("days/2024-01-02.md", 0, "git rebase interactive squash", "二日"),
        chunk("days/2024-01-03.md", 0, "sourdough bread hydration starter", "三日"),
    ])?;
    Ok(Retriever::new(collection))
}

fn generator(b: &ScriptedBackend) -> Generator {
    Generator::new(vec![Box::new(b.clone())])
}

/// Scores by position, last hit highest.
struct Reversed;

impl PairScorer for Reversed {
    fn predict(&self, _query: &str, texts: &[String]) -> Result<Vec<f32>> {
        Ok((0..texts.len()).map(|i| i as f32).collect())
    }
}

#[test]
fn search_puts_the_closest_chunk_first() -> Result<()> {
    let b = ScriptedBackend::failing("none");
    let p = RagPipeline::new(retriever()?, generator(&b));
    let hits = p.search("git rebase", 3)?;
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].metadata.path, "days/2024-01-02.md");
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    Ok(())
}

#[test]
fn rerank_reorders_and_keeps_top() -> Result<()> {
    let b = ScriptedBackend::failing("none");
    let reranker = Reranker::new(RerankBackendKind::CrossEncoder, Box::new(Reversed));
    let plain = RagPipeline::new(retriever()?, generator(&b)).search("git rebase", 3)?;
    let p = RagPipeline::new(retriever()?, generator(&b)).with_reranker(reranker, Some(1));
    assert!(p.reranks());
    let hits = p.search("git rebase", 3)?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, plain[2].id);
    assert_eq!(hits[0].rerank_score, Some(2.0));
    Ok(())
}

#[test]
fn answer_prompt_carries_question_and_labelled_context() -> Result<()> {
    let b = ScriptedBackend::with_responses("ollama", vec!["  結論: squash でまとめる。  ".into()]);
    let p = RagPipeline::new(retriever()?, generator(&b));
    let answer = p.answer("git rebase", 2)?;
    assert_eq!(answer.text, "結論: squash でまとめる。");
    assert_eq!(answer.safety, Some(SafetyResolution::Safe));
    assert_eq!(answer.hits.len(), 2);

    let prompt = &b.prompts()[0];
    assert!(prompt.contains("# 質問\ngit rebase\n"));
    assert!(prompt.contains("- 二日 - git rebase interactive squash"));
    Ok(())
}

#[test]
fn answer_without_backend_is_the_sentinel() -> Result<()> {
    let b = ScriptedBackend::failing("ollama");
    let answer = RagPipeline::new(retriever()?, generator(&b)).answer("q", 3)?;
    assert_eq!(answer.text, NO_BACKEND_SENTINEL);
    assert_eq!(answer.safety, None);
    assert_eq!(b.calls(), 1);
    Ok(())
}

#[test]
fn draft_runs_safety_then_length_with_the_safer_prompt() -> Result<()> {
    let unsafe_short = "## 今日の一歩\n古いブランチを git reset --hard で消す。".to_string();
    let safe_short = "## 今日の一歩\n新しいブランチで試す。".to_string();
    let safe_long = format!("## 今日の一歩\n{}", "あ".repeat(400));
    let b = ScriptedBackend::with_responses("lmstudio", vec![unsafe_short, safe_short, safe_long.clone()]);
    let p = RagPipeline::new(retriever()?, generator(&b));

    let draft = p.draft("git rebase", 5, DEFAULT_DRAFT_TEMPLATE)?;
    assert!(draft.generated());
    assert_eq!(draft.safety, Some(SafetyResolution::Regenerated));
    assert_eq!(draft.length, Some(LengthResolution::Regenerated));
    assert_eq!(draft.text, safe_long);

    let prompts = b.prompts();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[0].contains("テーマ: git rebase"));
    assert!(prompts[1].starts_with(&prompts[0]));
    assert!(prompts[2].starts_with(&prompts[1]));
    assert!(prompts[2].ends_with(&LengthEnforcer::new(300, 600).instruction()));
    Ok(())
}

#[test]
fn draft_length_bounds_are_configurable() -> Result<()> {
    let b = ScriptedBackend::repeating("ollama", "短い本文");
    let p = RagPipeline::new(retriever()?, generator(&b)).with_length(LengthEnforcer::new(1, 10));
    let draft = p.draft("bread", 1, "{topic}: {context}")?;
    assert_eq!(draft.length, Some(LengthResolution::WithinRange));
    assert_eq!(draft.hits.len(), 1);
    assert_eq!(b.calls(), 1);
    Ok(())
}

#[test]
fn sentinel_draft_skips_both_passes() -> Result<()> {
    let b = ScriptedBackend::failing("ollama");
    let draft = RagPipeline::new(retriever()?, generator(&b)).draft("rust", 5, DEFAULT_DRAFT_TEMPLATE)?;
    assert!(!draft.generated());
    assert_eq!(draft.text, NO_BACKEND_SENTINEL);
    assert_eq!(draft.length, None);
    assert_eq!(b.calls(), 1);
    Ok(())
}

#[test]
fn saved_draft_history_matches_latest() -> Result<()> {
    let dir = TempDir::new()?;
    let b = ScriptedBackend::repeating("ollama", "今日の一歩: 散歩する");
    let p = RagPipeline::new(retriever()?, generator(&b)).with_length(LengthEnforcer::new(1, 100));
    let draft = p.draft("散歩", 2, DEFAULT_DRAFT_TEMPLATE)?;

    let store = DraftStore::new(dir.path().join("drafts"), dir.path().join("logs").join("last_draft.txt"));
    let saved = store.save(&DraftArtifact::new(&draft.topic, &draft.text))?;
    assert!(saved.history.file_name().unwrap().to_string_lossy().ends_with("_散歩.txt"));
    assert_eq!(fs::read_to_string(&saved.history)?, fs::read_to_string(&saved.latest)?);
    assert_eq!(fs::read_to_string(&saved.latest)?, "今日の一歩: 散歩する");
    Ok(())
}
