use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use daybook_core::config::{AppConfig, RerankBackendKind};

#[derive(Parser, Debug)]
#[command(name = "daybook", version, about = "Search and draft from a Markdown journal", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Split every Markdown file of a repository into JSONL chunk records
    Split {
        #[arg(long)]
        repo: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Override chunking.max_chars
        #[arg(long)]
        max_chars: Option<usize>,
    },
    /// Embed and upsert JSONL chunk records into the collection
    Ingest {
        #[arg(long)]
        chunks: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        collection: Option<String>,
    },
    /// Print the nearest chunks for a query
    Query(QueryArgs),
    /// Answer a question from retrieved context
    Answer {
        #[command(flatten)]
        query: QueryArgs,
        /// Print the titles of the hits used as context
        #[arg(long)]
        show_sources: bool,
    },
    /// Write a short essay on a topic and save it
    Draft {
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        topic: String,
        #[arg(long)]
        k: Option<usize>,
        #[arg(long)]
        template: Option<PathBuf>,
        #[arg(long)]
        outdir: Option<PathBuf>,
        #[command(flatten)]
        rerank: RerankArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[arg(long)]
    pub db: Option<PathBuf>,
    #[arg(long)]
    pub q: String,
    #[arg(long)]
    pub k: Option<usize>,
    #[command(flatten)]
    pub rerank: RerankArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RerankArgs {
    /// Rerank retrieved hits with a local pairwise model
    #[arg(long)]
    pub rerank: bool,
    /// ce (cross-encoder) or bge
    #[arg(long)]
    pub rrk_backend: Option<RerankBackendKind>,
    /// Local model directory for the reranker
    #[arg(long)]
    pub rrk_model: Option<PathBuf>,
    /// Keep this many hits after reranking (default: k)
    #[arg(long)]
    pub rrk_top: Option<usize>,
}

impl RerankArgs {
    pub fn apply(&self, cfg: &mut AppConfig) {
        if let Some(backend) = self.rrk_backend {
            cfg.rerank.backend = backend;
        }
        if let Some(dir) = &self.rrk_model {
            cfg.rerank.model_dir = Some(dir.to_string_lossy().into_owned());
        }
    }
}

/// Flags win over every configuration layer.
pub fn apply_db(cfg: &mut AppConfig, db: Option<&PathBuf>) {
    if let Some(db) = db {
        cfg.collection.db_path = db.to_string_lossy().into_owned();
    }
}
