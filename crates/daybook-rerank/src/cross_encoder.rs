use std::path::Path;

use anyhow::Result;
use candle_core::{Device, IndexOp, Tensor};
use candle_nn::{linear, ops, Linear, Module};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::Deserialize;
use tokenizers::Tokenizer;

use daybook_embed::{select_device, tokenize, weights};

use crate::PairScorer;

#[derive(Deserialize)]
struct HeadConfig {
    hidden_size: usize,
}

/// BERT cross-encoder with a pooler and a single-logit classifier head
/// (`ms-marco-MiniLM` layout). Scores are sigmoid probabilities in (0, 1).
pub struct CrossEncoderScorer {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
    batch_size: usize,
}

impl CrossEncoderScorer {
    pub fn load(model_dir: &Path, max_length: usize, device: &str) -> Result<Self> {
        let device = select_device(device);
        let tokenizer = tokenize::load_tokenizer(&weights::require_file(model_dir, "tokenizer.json")?, max_length)?;
        let raw = std::fs::read_to_string(weights::require_file(model_dir, "config.json")?)?;
        let config: BertConfig = serde_json::from_str(&raw)?;
        let head: HeadConfig = serde_json::from_str(&raw)?;
        let vb = weights::load_weights(model_dir, &device)?;
        let bert = BertModel::load(vb.pp("bert"), &config)?;
        let pooler = linear(head.hidden_size, head.hidden_size, vb.pp("bert.pooler.dense"))?;
        let classifier = linear(head.hidden_size, 1, vb.pp("classifier"))?;
        Ok(Self { bert, pooler, classifier, tokenizer, device, batch_size: 16 })
    }
}

/// `[batch, 1]` logits to one probability per pair.
fn relevance(logits: &Tensor) -> Result<Vec<f32>> {
    Ok(ops::sigmoid(&logits.squeeze(1)?)?.to_device(&Device::Cpu)?.to_vec1::<f32>()?)
}

impl PairScorer for CrossEncoderScorer {
    fn predict(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            let batch = tokenize::encode_pairs(&self.tokenizer, query, chunk, &self.device)?;
            let hidden = self.bert.forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
            let cls = hidden.i((.., 0))?;
            let pooled = self.pooler.forward(&cls)?.tanh()?;
            let logits = self.classifier.forward(&pooled)?;
            scores.extend(relevance(&logits)?);
        }
        Ok(scores)
    }
}
