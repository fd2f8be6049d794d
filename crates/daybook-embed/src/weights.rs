use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use daybook_core::error::Error;
use tracing::debug;

/// `dir/name`, or a configuration error naming what is missing.
pub fn require_file(dir: &Path, name: &str) -> Result<PathBuf> {
    let p = dir.join(name);
    if p.is_file() {
        Ok(p)
    } else {
        Err(Error::InvalidConfig(format!("model file {} not found", p.display())).into())
    }
}

/// Weights from `model.safetensors`, falling back to `pytorch_model.bin`.
pub fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    let pickle = model_dir.join("pytorch_model.bin");
    let tensors: HashMap<String, Tensor> = if safetensors.is_file() {
        debug!(path = %safetensors.display(), "loading safetensors weights");
        candle_core::safetensors::load(&safetensors, device)?
    } else if pickle.is_file() {
        debug!(path = %pickle.display(), "loading pickle weights");
        candle_core::pickle::read_all(&pickle)?.into_iter().collect()
    } else {
        return Err(Error::InvalidConfig(format!(
            "no model.safetensors or pytorch_model.bin in {}",
            model_dir.display()
        ))
        .into());
    };
    Ok(VarBuilder::from_tensors(tensors, DType::F32, device))
}
