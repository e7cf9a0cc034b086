use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::size::ModelDimensions;

pub const CONFIG_NAME: &str = "config.json";
pub const DEFAULT_VOCAB_SIZE: usize = 50277;
pub const DEFAULT_CONTEXT_LENGTH: usize = 1024;

/// The Hugging Face `RwkvConfig` record, fields in key order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RwkvConfig {
    pub architectures: Vec<String>,
    pub attention_hidden_size: usize,
    pub bos_token_id: u32,
    pub context_length: usize,
    pub eos_token_id: u32,
    pub hidden_size: usize,
    pub intermediate_size: usize,
    pub layer_norm_epsilon: f64,
    pub model_type: String,
    pub num_hidden_layers: usize,
    pub rescale_every: usize,
    pub tie_word_embeddings: bool,
    pub use_cache: bool,
    pub vocab_size: usize,
}

impl RwkvConfig {
    pub fn new(vocab_size: usize, dims: ModelDimensions, context_length: usize) -> Self {
        Self {
            architectures: vec!["RwkvForCausalLM".to_string()],
            attention_hidden_size: dims.hidden_size,
            bos_token_id: 0,
            context_length,
            eos_token_id: 0,
            hidden_size: dims.hidden_size,
            intermediate_size: 4 * dims.hidden_size,
            layer_norm_epsilon: 1e-5,
            model_type: "rwkv".to_string(),
            num_hidden_layers: dims.num_hidden_layers,
            rescale_every: 6,
            tie_word_embeddings: false,
            use_cache: true,
            vocab_size,
        }
    }

    pub fn from_huggingface_transformers_json(config: &serde_json::Value) -> Result<Self, Error> {
        Ok(serde_json::from_value(config.clone())?)
    }

    pub fn to_json_string(&self) -> Result<String, Error> {
        let value = serde_json::to_value(self)?;
        Ok(serde_json::to_string_pretty(&value)? + "\n")
    }

    pub fn save_pretrained(&self, output_dir: &Path) -> Result<PathBuf, Error> {
        let path = output_dir.join(CONFIG_NAME);
        std::fs::write(&path, self.to_json_string()?)?;
        tracing::info!("Configuration saved in {}", path.display());
        Ok(path)
    }
}
