use std::path::{Path, PathBuf};

use crate::Error;

pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";
pub const SPECIAL_TOKENS_MAP_FILE: &str = "special_tokens_map.json";

/// A tokenizer that can be copied next to the converted model.
pub trait TokenizerArtifact {
    /// Number of token ids, added tokens included.
    fn vocab_size(&self) -> usize;
    fn save_pretrained(&self, output_dir: &Path) -> Result<Vec<PathBuf>, Error>;
}

pub struct HfTokenizer {
    tokenizer: tokenizers::Tokenizer,
    model_max_length: usize,
}

impl HfTokenizer {
    pub fn from_file(path: &Path, model_max_length: usize) -> Result<Self, Error> {
        tracing::info!("Loading tokenizer from {}", path.display());
        Ok(Self {
            tokenizer: tokenizers::Tokenizer::from_file(path)?,
            model_max_length,
        })
    }

    fn write_json(path: &Path, value: &serde_json::Value) -> Result<(), Error> {
        std::fs::write(path, serde_json::to_string_pretty(value)? + "\n")?;
        Ok(())
    }
}

impl TokenizerArtifact for HfTokenizer {
    fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    fn save_pretrained(&self, output_dir: &Path) -> Result<Vec<PathBuf>, Error> {
        let tokenizer_path = output_dir.join(TOKENIZER_FILE);
        self.tokenizer.save(&tokenizer_path, false)?;

        let config_path = output_dir.join(TOKENIZER_CONFIG_FILE);
        Self::write_json(
            &config_path,
            &serde_json::json!({
                "model_max_length": self.model_max_length,
                "tokenizer_class": "PreTrainedTokenizerFast",
            }),
        )?;

        let special_tokens_path = output_dir.join(SPECIAL_TOKENS_MAP_FILE);
        Self::write_json(&special_tokens_path, &serde_json::json!({}))?;

        tracing::info!("Tokenizer files saved in {}", output_dir.display());
        Ok(vec![tokenizer_path, config_path, special_tokens_path])
    }
}
