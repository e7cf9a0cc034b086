use std::path::PathBuf;

use rwkv_checkpoint::Checkpoint;
use rwkv_checkpoint::checkpoint::compact_safetensors;
use rwkv_checkpoint::shard::{plan_shards, SAFE_WEIGHTS_INDEX_NAME, SAFE_WEIGHTS_NAME};

use crate::config::{RwkvConfig, DEFAULT_VOCAB_SIZE};
use crate::hub::ArtifactFetcher;
use crate::rename::convert_state_dict;
use crate::size::SizeRequest;
use crate::tokenizer::{HfTokenizer, TokenizerArtifact};
use crate::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckpointSource {
    Remote { repo_id: String, filename: String },
    Local(PathBuf),
}

impl CheckpointSource {
    /// Build a source from the CLI flags. A complete remote pair wins over a local file.
    pub fn from_args(
        repo_id: Option<String>,
        checkpoint_file: Option<String>,
        model_file: Option<PathBuf>,
    ) -> Result<Self, Error> {
        match (repo_id, checkpoint_file, model_file) {
            (Some(repo_id), Some(filename), _) => Ok(Self::Remote { repo_id, filename }),
            (_, _, Some(path)) => Ok(Self::Local(path)),
            _ => Err(Error::MissingSourceError),
        }
    }

    /// Name used to infer the model size.
    pub fn checkpoint_name(&self) -> String {
        match self {
            Self::Remote { filename, .. } => filename.clone(),
            Self::Local(path) => path
                .file_name()
                .map(|x| x.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    fn acquire(&self, fetcher: &dyn ArtifactFetcher) -> Result<PathBuf, Error> {
        match self {
            Self::Remote { repo_id, filename } => fetcher.fetch(repo_id, filename),
            Self::Local(path) => Ok(path.clone()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConvertOptions {
    pub source: CheckpointSource,
    pub output_dir: PathBuf,
    pub tokenizer_file: Option<PathBuf>,
    pub size: SizeRequest,
    pub context_length: usize,
    pub max_shard_size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Compaction {
    Completed,
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct ConversionReport {
    pub config: RwkvConfig,
    pub tokenizer_files: Vec<PathBuf>,
    pub shard_files: Vec<PathBuf>,
    pub index_file: Option<PathBuf>,
    pub compaction: Compaction,
}

/// Rewrite every shard in turn. Stops at the first failure; shards already
/// written stay valid either way.
pub fn compact_shards(shard_files: &[PathBuf]) -> Compaction {
    for path in shard_files {
        if let Err(err) = compact_safetensors(path) {
            return Compaction::Failed(format!("{}: {err}", path.display()));
        }
    }
    Compaction::Completed
}

fn write_shards(state_dict: Checkpoint, options: &ConvertOptions) -> Result<(Vec<PathBuf>, Option<PathBuf>), Error> {
    let plan = plan_shards(state_dict, options.max_shard_size, SAFE_WEIGHTS_NAME)?;
    let mut shard_files = Vec::with_capacity(plan.shards.len());
    for (shard_file, shard) in &plan.shards {
        let path = options.output_dir.join(shard_file);
        shard.save_safetensors(&path)?;
        tracing::debug!("Wrote {} ({} tensors)", path.display(), shard.len());
        shard_files.push(path);
    }

    let index_file = match &plan.index {
        Some(index) => {
            let path = options.output_dir.join(SAFE_WEIGHTS_INDEX_NAME);
            index.save(&path)?;
            tracing::info!(
                "Model split into {} shards, index saved in {}",
                shard_files.len(),
                path.display()
            );
            Some(path)
        }
        None => None,
    };
    Ok((shard_files, index_file))
}

/// Convert a BlinkDL RWKV checkpoint into a Hugging Face model directory.
pub fn convert(options: &ConvertOptions, fetcher: &dyn ArtifactFetcher) -> Result<ConversionReport, Error> {
    std::fs::create_dir_all(&options.output_dir)?;

    // 1. Tokenizer
    let (vocab_size, tokenizer_files) = match &options.tokenizer_file {
        Some(path) => {
            let tokenizer = HfTokenizer::from_file(path, options.context_length)?;
            let files = tokenizer.save_pretrained(&options.output_dir)?;
            (tokenizer.vocab_size(), files)
        }
        None => {
            tracing::info!("No `--tokenizer_file` provided, only the model will be converted");
            (DEFAULT_VOCAB_SIZE, vec![])
        }
    };

    // 2. Config
    let mut size = options.size.clone();
    if size.checkpoint_name.is_none() {
        size.checkpoint_name = Some(options.source.checkpoint_name());
    }
    let dims = size.resolve()?;
    let config = RwkvConfig::new(vocab_size, dims, options.context_length);
    config.save_pretrained(&options.output_dir)?;

    // 3-5. Acquire, load and rename
    let model_file = options.source.acquire(fetcher)?;
    let state_dict = Checkpoint::load(&model_file)?;
    tracing::info!("Loaded {} tensors from {}", state_dict.len(), model_file.display());
    let state_dict = convert_state_dict(state_dict)?;

    // 6-7. Shard and save
    let (shard_files, index_file) = write_shards(state_dict, options)?;

    // 8. Re-save every shard from fresh buffers
    tracing::info!("Cleaning up shards. This may fail with an out of memory error; if it does, the converted model is still usable.");
    let compaction = compact_shards(&shard_files);
    if let Compaction::Failed(reason) = &compaction {
        tracing::warn!(
            "Shard cleanup failed ({}). The shards in {} are complete and valid.",
            reason,
            options.output_dir.display()
        );
    }

    Ok(ConversionReport {
        config,
        tokenizer_files,
        shard_files,
        index_file,
        compaction,
    })
}
