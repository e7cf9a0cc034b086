use std::collections::TryReserveError;
use std::path::PathBuf;

pub mod tensor;
pub mod checkpoint;
pub mod shard;

pub use checkpoint::Checkpoint;
pub use safetensors::Dtype;
pub use shard::{ShardIndex, ShardPlan};
pub use tensor::TensorData;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Safetensors error: {0}")]
    SafeTensorError(#[from] safetensors::SafeTensorError),
    #[error("Candle error: {0}")]
    CandleCoreError(#[from] candle_core::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Unsupported dtype: {0}")]
    UnsupportedDTypeError(String),
    #[error("Tensor data is {actual} bytes, shape {shape:?} needs {expected}")]
    TensorSizeError {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
    #[error("Tensor {0} is listed in the pickle but has no data")]
    MissingTensorError(String),
    #[error("Duplicate tensor name: {0}")]
    DuplicateKeyError(String),
    #[error("Unknown checkpoint format: {0}")]
    UnknownCheckpointFormatError(PathBuf),
    #[error("Invalid shard size: {0}")]
    InvalidShardSizeError(String),
    #[error("Out of memory: {0}")]
    OutOfMemoryError(#[from] TryReserveError),
    #[error("Failed to replace {path}: {source}")]
    PersistError {
        path: PathBuf,
        source: tempfile::PersistError,
    },
}
