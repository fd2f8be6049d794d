use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use daybook_core::chunker::Chunker;
use daybook_core::composer::snippet;
use daybook_core::config::{expand_path, AppConfig};
use daybook_core::corpus::CorpusWalker;
use daybook_core::records::write_jsonl;
use daybook_core::traits::VectorCollection;
use daybook_core::types::Hit;
use daybook_embed::embedder_from_config;
use daybook_gen::{Generator, LengthEnforcer};
use daybook_pipeline::{load_template, DraftArtifact, DraftStore, RagPipeline};
use daybook_rerank::Reranker;
use daybook_vector::{Indexer, LanceCollection, Retriever};

mod cli;

use cli::{apply_db, Cli, Command, QueryArgs, RerankArgs};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut config = AppConfig::load().context("loading configuration")?;

    match cli.command {
        Command::Split { repo, out, max_chars } => {
            if let Some(max) = max_chars {
                config.chunking.max_chars = max;
            }
            split(&config, &repo, &out)
        }
        Command::Ingest { chunks, db, collection } => {
            apply_db(&mut config, db.as_ref());
            if let Some(name) = collection {
                config.collection.name = name;
            }
            ingest(&config, &chunks)
        }
        Command::Query(args) => query(&mut config, &args),
        Command::Answer { query, show_sources } => answer(&mut config, &query, show_sources),
        Command::Draft { db, topic, k, template, outdir, rerank } => {
            apply_db(&mut config, db.as_ref());
            if let Some(k) = k {
                config.draft.top_k = k;
            }
            if let Some(t) = template {
                config.draft.template = t.to_string_lossy().into_owned();
            }
            if let Some(dir) = outdir {
                config.draft.out_dir = dir.to_string_lossy().into_owned();
            }
            draft(&mut config, &topic, &rerank)
        }
    }
}

fn split(config: &AppConfig, repo: &Path, out: &Path) -> Result<()> {
    let walker = CorpusWalker::new(Chunker::new(config.chunking.max_chars)?);
    let chunks = walker.collect(repo)?;
    let written = write_jsonl(&chunks, out)?;
    println!("[OK] wrote {written} chunks -> {}", out.display());
    Ok(())
}

fn ingest(config: &AppConfig, chunks: &Path) -> Result<()> {
    let embedder = embedder_from_config(&config.embedding, config.embedding_model_dir().as_deref())?;
    let collection = LanceCollection::open_or_create(&config.db_path(), &config.collection.name, embedder)?;
    let collection = Arc::new(collection);
    let indexer = Indexer::new(collection.clone(), config.collection.batch_size).with_progress(true);
    let upserted = indexer.ingest_jsonl(chunks)?;
    let total = collection.count()?;
    println!("[OK] upserted {upserted} chunks into {} ({total} stored)", config.collection.name);
    Ok(())
}

fn open_retriever(config: &AppConfig) -> Result<Retriever> {
    let embedder = embedder_from_config(&config.embedding, config.embedding_model_dir().as_deref())?;
    let collection = LanceCollection::open(&config.db_path(), &config.collection.name, embedder)?;
    Ok(Retriever::new(Arc::new(collection)))
}

/// Reranker construction fails fast when the model directory is missing.
fn build_pipeline(config: &mut AppConfig, db: Option<&PathBuf>, rerank: &RerankArgs) -> Result<RagPipeline> {
    apply_db(config, db);
    rerank.apply(config);
    let retriever = open_retriever(config)?;
    let generator = Generator::from_config(&config.generation)?;
    let mut pipeline = RagPipeline::new(retriever, generator)
        .with_length(LengthEnforcer::new(config.draft.min_chars, config.draft.max_chars));
    if rerank.rerank {
        let reranker = Reranker::from_config(&config.rerank, config.rerank_model_dir().as_deref())?;
        pipeline = pipeline.with_reranker(reranker, rerank.rrk_top);
    }
    Ok(pipeline)
}

fn title_of(hit: &Hit) -> &str {
    let extra = &hit.metadata.extra;
    extra
        .get("title")
        .or_else(|| extra.get("day"))
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("")
}

fn query(config: &mut AppConfig, args: &QueryArgs) -> Result<()> {
    let k = args.k.unwrap_or(config.query.top_k);
    let pipeline = build_pipeline(config, args.db.as_ref(), &args.rerank)?;
    let hits = pipeline.search(&args.q, k)?;
    if hits.is_empty() {
        info!("no hits");
    }
    for (i, h) in hits.iter().enumerate() {
        let mut prefix = format!("[{}]", i + 1);
        if let Some(score) = h.rerank_score {
            prefix.push_str(&format!(" (rrk={score:.3})"));
        }
        println!("{prefix} {} - {}", title_of(h), snippet(&h.text, 120));
    }
    Ok(())
}

fn answer(config: &mut AppConfig, args: &QueryArgs, show_sources: bool) -> Result<()> {
    let k = args.k.unwrap_or(config.query.top_k);
    let pipeline = build_pipeline(config, args.db.as_ref(), &args.rerank)?;
    let answer = pipeline.answer(&args.q, k)?;
    println!("{}", answer.text);

    if show_sources && !answer.hits.is_empty() {
        println!("\n--- sources ---");
        let shown = args.rerank.rrk_top.unwrap_or(k);
        for (i, h) in answer.hits.iter().take(shown).enumerate() {
            let title = title_of(h);
            println!("[{}] {}", i + 1, if title.is_empty() { "(no title)" } else { title });
        }
    }
    Ok(())
}

fn draft(config: &mut AppConfig, topic: &str, rerank: &RerankArgs) -> Result<()> {
    let pipeline = build_pipeline(config, None, rerank)?;
    let template = load_template(&expand_path(&config.draft.template));
    let draft = pipeline.draft(topic, config.draft.top_k, &template)?;

    let store = DraftStore::from_config(&config.draft);
    let saved = store.save(&DraftArtifact::new(&draft.topic, &draft.text))?;
    println!("{}", draft.text);
    println!("\n[Saved] {}", saved.history.display());
    Ok(())
}
