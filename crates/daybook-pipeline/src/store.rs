use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::info;

use daybook_core::config::{expand_path, DraftConfig};

const TOPIC_CHARS: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftArtifact {
    pub topic: String,
    pub timestamp: DateTime<Local>,
    pub text: String,
}

impl DraftArtifact {
    pub fn new(topic: &str, text: &str) -> Self {
        Self { topic: topic.to_string(), timestamp: Local::now(), text: text.to_string() }
    }

    /// `<YYYYmmdd_HHMMSS>_<safe_topic>.txt`
    pub fn file_name(&self) -> String {
        format!("{}_{}.txt", self.timestamp.format("%Y%m%d_%H%M%S"), safe_topic(&self.topic))
    }
}

/// Alphanumeric characters only (Unicode aware), at most 24, `topic` when nothing is left.
pub fn safe_topic(topic: &str) -> String {
    let kept: String = topic.chars().filter(|c| c.is_alphanumeric()).take(TOPIC_CHARS).collect();
    if kept.is_empty() {
        "topic".to_string()
    } else {
        kept
    }
}

/// Where a saved draft landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedDraft {
    pub history: PathBuf,
    pub latest: PathBuf,
}

/// One history file per run plus a latest pointer that is overwritten.
/// The two writes are independent; a crash in between leaves `latest` stale.
#[derive(Debug, Clone)]
pub struct DraftStore {
    out_dir: PathBuf,
    latest_path: PathBuf,
}

impl DraftStore {
    pub fn new(out_dir: impl Into<PathBuf>, latest_path: impl Into<PathBuf>) -> Self {
        Self { out_dir: out_dir.into(), latest_path: latest_path.into() }
    }

    pub fn from_config(cfg: &DraftConfig) -> Self {
        Self::new(expand_path(&cfg.out_dir), expand_path(&cfg.latest_path))
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn save(&self, artifact: &DraftArtifact) -> Result<SavedDraft> {
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("creating drafts directory {}", self.out_dir.display()))?;
        if let Some(parent) = self.latest_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }

        let history = self.out_dir.join(artifact.file_name());
        fs::write(&history, &artifact.text).with_context(|| format!("writing {}", history.display()))?;
        fs::write(&self.latest_path, &artifact.text)
            .with_context(|| format!("writing {}", self.latest_path.display()))?;

        info!(history = %history.display(), latest = %self.latest_path.display(), "draft saved");
        Ok(SavedDraft { history, latest: self.latest_path.clone() })
    }
}
