//! Text embedders: a local XLM-RoBERTa encoder (multilingual-e5 layout) run
//! through candle, and a deterministic hashing embedder for tests and dry runs.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{Device, Tensor};
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use daybook_core::config::EmbeddingConfig;
use daybook_core::error::Error;
use daybook_core::traits::Embedder;
use tokenizers::Tokenizer;
use tracing::{info, warn};

pub mod device;
pub mod pool;
pub mod tokenize;
pub mod weights;

pub use device::select_device;
pub use pool::masked_mean_l2;

const DEFAULT_MODEL_DIRS: &[&str] = &["models/multilingual-e5-large", "../models/multilingual-e5-large"];

pub struct XlmRobertaEmbedder {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    batch_size: usize,
}

impl XlmRobertaEmbedder {
    pub fn load(model_dir: &Path, cfg: &EmbeddingConfig) -> Result<Self> {
        let device = select_device(&cfg.device);
        info!(dir = %model_dir.display(), "loading embedding model");
        let tokenizer = tokenize::load_tokenizer(&weights::require_file(model_dir, "tokenizer.json")?, cfg.max_len)?;
        let config_path = weights::require_file(model_dir, "config.json")?;
        let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        let vb = weights::load_weights(model_dir, &device)?;
        let model = XLMRobertaModel::new(&config, vb)?;
        Ok(Self {
            model,
            tokenizer,
            device,
            dim: config.hidden_size,
            batch_size: cfg.batch_size.max(1),
        })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch = tokenize::encode_texts(&self.tokenizer, texts, &self.device)?;
        let hidden = self.model.forward(
            &batch.input_ids,
            &batch.attention_mask,
            &batch.token_type_ids,
            None,
            None,
            None,
        )?;
        let pooled: Tensor = masked_mean_l2(&hidden, &batch.attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        Ok(rows)
    }
}

impl Embedder for XlmRobertaEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            out.extend(self.embed_chunk(chunk)?);
        }
        if out.iter().any(|v| v.len() != self.dim) {
            return Err(anyhow!("embedding width does not match hidden size {}", self.dim));
        }
        let ms = start.elapsed().as_millis();
        if !texts.is_empty() && ms / (texts.len() as u128) > 250 {
            warn!(texts = texts.len(), ms, "slow embedding batch");
        }
        Ok(out)
    }
}

/// Bag of hashed whitespace tokens, L2-normalised. Identical text gives an
/// identical vector; texts sharing words land close together.
pub struct FakeEmbedder {
    dim: usize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;

        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let val = 0.5 + ((h >> 32) as u32) as f32 / (u32::MAX as f32);
            v[idx] += val;
        }
        if v.iter().all(|x| *x == 0.0) {
            v[0] = 1.0;
        }
        pool::l2_normalize(&mut v);
        v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

pub fn embedder_from_config(cfg: &EmbeddingConfig, model_dir: Option<&Path>) -> Result<Box<dyn Embedder>> {
    if cfg.use_fake {
        info!(dim = cfg.fake_dim, "using fake embedder");
        return Ok(Box::new(FakeEmbedder::new(cfg.fake_dim)));
    }
    let dir = resolve_model_dir(model_dir)?;
    Ok(Box::new(XlmRobertaEmbedder::load(&dir, cfg)?))
}

/// The configured directory, or the first default location that exists.
pub fn resolve_model_dir(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = configured {
        if p.is_dir() {
            return Ok(p.to_path_buf());
        }
        return Err(Error::InvalidConfig(format!("embedding model directory {} does not exist", p.display())).into());
    }
    DEFAULT_MODEL_DIRS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_dir())
        .ok_or_else(|| {
            Error::InvalidConfig("no embedding model directory configured (set embedding.model_dir)".into()).into()
        })
}
