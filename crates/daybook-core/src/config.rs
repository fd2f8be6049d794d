//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults, `daybook.toml`,
//! `daybook.<env>.toml`, legacy variables such as `OLLAMA_BASE_URL` and
//! `DAYBOOK_*` variables. Provides helpers to expand `~` and `${VAR}` and to
//! resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    value::Uncased,
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Environment names kept from the older shell-script setup, mapped onto
/// their place in [`AppConfig`].
const LEGACY_ENV: &[(&str, &str)] = &[
    ("LMSTUDIO_BASE_URL", "generation.lmstudio.base_url"),
    ("LMSTUDIO_MODEL", "generation.lmstudio.model"),
    ("OLLAMA_BASE_URL", "generation.ollama.base_url"),
    ("OLLAMA_MODEL", "generation.ollama.model"),
    ("OPENAI_API_KEY", "generation.openai.api_key"),
    ("OPENAI_MODEL", "generation.openai.model"),
    ("RERANKER_BACKEND", "rerank.backend"),
    ("RERANKER_MODEL", "rerank.model_dir"),
    ("RERANKER_DEVICE", "rerank.device"),
    ("TOP_K", "draft.top_k"),
    ("DRAFT_OUT_DIR", "draft.out_dir"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_chars: 1800 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Local directory with `config.json`, `tokenizer.json` and weights.
    pub model_dir: Option<String>,
    pub use_fake: bool,
    pub fake_dim: usize,
    pub max_len: usize,
    pub batch_size: usize,
    pub device: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_dir: None,
            use_fake: false,
            fake_dim: 384,
            max_len: 512,
            batch_size: 16,
            device: "cpu".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub db_path: String,
    pub name: String,
    pub batch_size: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            db_path: "storage/lancedb".to_string(),
            name: "days_collection".to_string(),
            batch_size: 256,
        }
    }
}

/// Deserialized through `FromStr`, so layered values are case-insensitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum RerankBackendKind {
    #[default]
    #[serde(rename = "ce")]
    CrossEncoder,
    #[serde(rename = "bge")]
    Bge,
}

impl RerankBackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CrossEncoder => "ce",
            Self::Bge => "bge",
        }
    }

    /// Hub name of the model each backend is built for.
    pub fn default_model(self) -> &'static str {
        match self {
            Self::CrossEncoder => "cross-encoder/ms-marco-MiniLM-L-6-v2",
            Self::Bge => "BAAI/bge-reranker-v2-m3",
        }
    }
}

impl fmt::Display for RerankBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RerankBackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ce" | "cross-encoder" => Ok(Self::CrossEncoder),
            "bge" => Ok(Self::Bge),
            other => Err(Error::InvalidConfig(format!("unknown reranker backend '{other}' (expected ce or bge)"))),
        }
    }
}

impl TryFrom<String> for RerankBackendKind {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub backend: RerankBackendKind,
    pub model_dir: Option<String>,
    pub max_length: usize,
    pub device: String,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self { backend: RerankBackendKind::default(), model_dir: None, max_length: 512, device: "cpu".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmStudioConfig {
    pub base_url: Option<String>,
    pub model: String,
}

impl Default for LmStudioConfig {
    fn default() -> Self {
        Self { base_url: None, model: "Qwen2.5-7B-Instruct".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self { enabled: true, base_url: "http://localhost:11434".to_string(), model: "qwen2.5:7b".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self { api_key: None, base_url: "https://api.openai.com/v1".to_string(), model: "gpt-4o-mini".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub timeout_secs: u64,
    pub temperature: f32,
    pub lmstudio: LmStudioConfig,
    pub ollama: OllamaConfig,
    pub openai: OpenAiConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            temperature: 0.7,
            lmstudio: LmStudioConfig::default(),
            ollama: OllamaConfig::default(),
            openai: OpenAiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftConfig {
    pub top_k: usize,
    pub template: String,
    pub out_dir: String,
    pub latest_path: String,
    pub min_chars: usize,
    pub max_chars: usize,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            template: "prompts/daily_ja.txt".to_string(),
            out_dir: "storage/drafts".to_string(),
            latest_path: "storage/logs/last_draft.txt".to_string(),
            min_chars: 300,
            max_chars: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub top_k: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { top_k: 8 }
    }
}

/// Everything a run needs, resolved once and handed to constructors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub collection: CollectionConfig,
    pub query: QueryConfig,
    pub rerank: RerankConfig,
    pub generation: GenerationConfig,
    pub draft: DraftConfig,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = Self::from_figment(&Self::figment())?;
        Ok(config)
    }

    /// Defaults, then `daybook.toml`, then `daybook.<env>.toml`, then legacy
    /// variables, then `DAYBOOK_*` variables (`__` separates nesting).
    pub fn figment() -> Figment {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let env_file = match env_name.as_str() {
            "dev" | "development" => "daybook.dev.toml".to_string(),
            "prod" | "production" => "daybook.prod.toml".to_string(),
            "test" | "testing" => "daybook.test.toml".to_string(),
            other => format!("daybook.{other}.toml"),
        };

        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("daybook.toml"))
            .merge(Toml::file(env_file))
            .merge(legacy_env())
            .merge(Env::prefixed("DAYBOOK_").split("__"))
    }

    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Self = figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_chars == 0 {
            return Err(Error::InvalidConfig("chunking.max_chars must be positive".into()));
        }
        if self.collection.name.trim().is_empty() {
            return Err(Error::InvalidConfig("collection.name must not be empty".into()));
        }
        if self.collection.batch_size == 0 {
            return Err(Error::InvalidConfig("collection.batch_size must be positive".into()));
        }
        if self.draft.min_chars > self.draft.max_chars {
            return Err(Error::InvalidConfig(format!(
                "draft.min_chars ({}) exceeds draft.max_chars ({})",
                self.draft.min_chars, self.draft.max_chars
            )));
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        expand_path(&self.collection.db_path)
    }

    pub fn embedding_model_dir(&self) -> Option<PathBuf> {
        self.embedding.model_dir.as_deref().map(expand_path)
    }

    pub fn rerank_model_dir(&self) -> Option<PathBuf> {
        self.rerank.model_dir.as_deref().map(expand_path)
    }
}

fn legacy_env() -> Env {
    let names: Vec<&str> = LEGACY_ENV.iter().map(|(name, _)| *name).collect();
    Env::raw().only(&names).map(|key| {
        let mapped = LEGACY_ENV
            .iter()
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
            .map_or(key.as_str(), |(_, path)| *path);
        Uncased::from(mapped.to_string())
    })
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
