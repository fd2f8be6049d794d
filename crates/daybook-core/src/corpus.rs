//! Walks a notes repository and turns every Markdown file into chunks.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::chunker::Chunker;
use crate::types::{Chunk, Document};

/// Directories searched, in priority order. The repository root is always last.
const PRIORITY_DIRS: &[&str] = &["days"];

pub struct CorpusWalker {
    chunker: Chunker,
}

impl CorpusWalker {
    pub fn new(chunker: Chunker) -> Self {
        Self { chunker }
    }

    /// All `*.md` documents under `repo`, `days/` first, each relative path once.
    pub fn documents(&self, repo: &Path) -> anyhow::Result<Vec<Document>> {
        if !repo.is_dir() {
            return Err(crate::error::Error::NotFound(format!("corpus directory {}", repo.display())).into());
        }
        let mut targets: Vec<PathBuf> = PRIORITY_DIRS.iter().map(|d| repo.join(d)).filter(|p| p.is_dir()).collect();
        targets.push(repo.to_path_buf());

        let mut seen = HashSet::new();
        let mut docs = Vec::new();
        for target in &targets {
            for path in list_md_files(target) {
                let rel = relative_slash_path(&path, repo);
                if !seen.insert(rel.clone()) {
                    continue;
                }
                let text = read_file_content(&path)?;
                debug!(path = %rel, chars = text.chars().count(), "read document");
                docs.push(Document { path: rel, text });
            }
        }
        Ok(docs)
    }

    pub fn collect(&self, repo: &Path) -> anyhow::Result<Vec<Chunk>> {
        let docs = self.documents(repo)?;
        let chunks: Vec<Chunk> = docs.iter().flat_map(|d| self.chunker.split(d)).collect();
        info!(documents = docs.len(), chunks = chunks.len(), "split corpus");
        Ok(chunks)
    }
}

fn read_file_content(file_path: &Path) -> anyhow::Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn is_git_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name() == ".git"
}

fn list_md_files(root: &Path) -> Vec<PathBuf> {
    let mut md_files = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_git_dir(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("md") {
            md_files.push(path.to_path_buf());
        }
    }
    md_files
}

fn relative_slash_path(path: &Path, base: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
