use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::{
    Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams, TruncationStrategy,
};

/// Token tensors for one forward pass, all shaped `[B, T]`.
pub struct TokenBatch {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub token_type_ids: Tensor,
}

/// Load `tokenizer.json` and set truncation to `max_len` plus pad-to-longest.
pub fn load_tokenizer(path: &std::path::Path, max_len: usize) -> Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(path)
        .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", path.display(), e))?;
    let (pad_id, pad_token) = pad_token(&tokenizer);
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_len,
            strategy: TruncationStrategy::LongestFirst,
            ..Default::default()
        }))
        .map_err(|e| anyhow!("Invalid truncation settings: {}", e))?;
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        pad_id,
        pad_token,
        ..Default::default()
    }));
    Ok(tokenizer)
}

fn pad_token(tokenizer: &Tokenizer) -> (u32, String) {
    for candidate in ["<pad>", "[PAD]"] {
        if let Some(id) = tokenizer.token_to_id(candidate) {
            return (id, candidate.to_string());
        }
    }
    (0, "[PAD]".to_string())
}

pub fn encode_texts(tokenizer: &Tokenizer, texts: &[String], device: &Device) -> Result<TokenBatch> {
    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    stack(&encodings, device)
}

/// `(query, text)` pairs for cross-encoders; truncation trims the longest side first.
pub fn encode_pairs(tokenizer: &Tokenizer, query: &str, texts: &[String], device: &Device) -> Result<TokenBatch> {
    let pairs: Vec<(String, String)> = texts.iter().map(|t| (query.to_string(), t.clone())).collect();
    let encodings = tokenizer
        .encode_batch(pairs, true)
        .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    stack(&encodings, device)
}

fn stack(encodings: &[Encoding], device: &Device) -> Result<TokenBatch> {
    let batch = encodings.len();
    let len = encodings.first().map_or(0, Encoding::len);
    let mut ids = Vec::with_capacity(batch * len);
    let mut mask = Vec::with_capacity(batch * len);
    let mut types = Vec::with_capacity(batch * len);
    for enc in encodings {
        if enc.len() != len {
            return Err(anyhow!("ragged batch: {} vs {} tokens", enc.len(), len));
        }
        ids.extend_from_slice(enc.get_ids());
        mask.extend_from_slice(enc.get_attention_mask());
        types.extend_from_slice(enc.get_type_ids());
    }
    Ok(TokenBatch {
        input_ids: Tensor::from_vec(ids, (batch, len), device)?,
        attention_mask: Tensor::from_vec(mask, (batch, len), device)?,
        token_type_ids: Tensor::from_vec(types, (batch, len), device)?,
    })
}
