use std::path::Path;

use anyhow::Result;
use candle_core::Device;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaForSequenceClassification};
use tokenizers::Tokenizer;

use daybook_embed::{select_device, tokenize, weights};

use crate::PairScorer;

/// XLM-RoBERTa sequence classifier with one relevance logit (`bge-reranker` layout).
pub struct BgeScorer {
    model: XLMRobertaForSequenceClassification,
    tokenizer: Tokenizer,
    device: Device,
    batch_size: usize,
}

impl BgeScorer {
    pub fn load(model_dir: &Path, max_length: usize, device: &str) -> Result<Self> {
        let device = select_device(device);
        let tokenizer = tokenize::load_tokenizer(&weights::require_file(model_dir, "tokenizer.json")?, max_length)?;
        let config: XLMRobertaConfig =
            serde_json::from_str(&std::fs::read_to_string(weights::require_file(model_dir, "config.json")?)?)?;
        let vb = weights::load_weights(model_dir, &device)?;
        let model = XLMRobertaForSequenceClassification::new(1, &config, vb)?;
        Ok(Self { model, tokenizer, device, batch_size: 8 })
    }
}

impl PairScorer for BgeScorer {
    fn predict(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            let batch = tokenize::encode_pairs(&self.tokenizer, query, chunk, &self.device)?;
            let logits = self.model.forward(&batch.input_ids, &batch.attention_mask, &batch.token_type_ids)?;
            scores.extend(logits.squeeze(1)?.to_device(&Device::Cpu)?.to_vec1::<f32>()?);
        }
        Ok(scores)
    }
}
