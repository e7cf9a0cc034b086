pub mod rename;
pub mod size;
pub mod config;
pub mod tokenizer;
pub mod hub;
pub mod convert;

pub use config::RwkvConfig;
pub use convert::{convert, CheckpointSource, Compaction, ConversionReport, ConvertOptions};
pub use rename::{convert_state_dict, rename_key};
pub use size::{ModelDimensions, SizeProfile, SizeRequest};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not resolve model size: {0}")]
    ConfigResolutionError(String),
    #[error("Tensors {first} and {second} both rename to {target}")]
    DuplicateKeyError {
        target: String,
        first: String,
        second: String,
    },
    #[error("No checkpoint source: pass --repo_id with --checkpoint_file, or --model_file")]
    MissingSourceError,
    #[error("Invalid repository identifier: {0}")]
    InvalidRepoIdError(String),
    #[error(transparent)]
    CheckpointError(#[from] rwkv_checkpoint::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error(transparent)]
    TokenizersError(#[from] tokenizers::Error),
    #[error("Hub download error: {0}")]
    HubError(#[from] hf_hub::api::sync::ApiError),
}
