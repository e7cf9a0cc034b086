use std::path::PathBuf;

use clap::Parser;
use rwkv_checkpoint::shard::{parse_shard_size, DEFAULT_MAX_SHARD_SIZE};
use rwkv_hub_convert::config::DEFAULT_CONTEXT_LENGTH;
use rwkv_hub_convert::hub::HubFetcher;
use rwkv_hub_convert::{convert, CheckpointSource, ConvertOptions, SizeRequest};
use tracing_subscriber::EnvFilter;

/// Convert a BlinkDL RWKV checkpoint to the Hugging Face format.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Repo ID from which to pull the checkpoint.
    #[arg(long = "repo_id", requires = "checkpoint_file")]
    repo_id: Option<String>,

    /// Name of the checkpoint file in the repo.
    #[arg(long = "checkpoint_file", requires = "repo_id")]
    checkpoint_file: Option<String>,

    /// Local checkpoint to convert instead of downloading one.
    #[arg(long = "model_file")]
    model_file: Option<PathBuf>,

    /// Where to save the converted model.
    #[arg(long = "output_dir")]
    output_dir: PathBuf,

    /// Path to the tokenizer file to use (if not provided, only the model is converted).
    #[arg(long = "tokenizer_file")]
    tokenizer_file: Option<PathBuf>,

    /// Size of the model. Will be inferred from the checkpoint name if not passed.
    #[arg(long = "size")]
    size: Option<String>,

    /// Hidden size; takes precedence over `--size` (default 256 when only the layer count is given).
    #[arg(long = "hidden_size")]
    hidden_size: Option<usize>,

    /// Layer count; takes precedence over `--size` (default 12 when only the hidden size is given).
    #[arg(long = "num_hidden_layers")]
    num_hidden_layers: Option<usize>,

    /// Revision of the hub repository.
    #[arg(long = "revision", default_value = "main")]
    revision: String,

    #[arg(long = "context_length", default_value_t = DEFAULT_CONTEXT_LENGTH)]
    context_length: usize,

    /// Maximum size of a weight shard, e.g. `10GB` or `500MiB`.
    #[arg(long = "max_shard_size", default_value = DEFAULT_MAX_SHARD_SIZE)]
    max_shard_size: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let source = CheckpointSource::from_args(args.repo_id, args.checkpoint_file, args.model_file)?;
    let options = ConvertOptions {
        source,
        output_dir: args.output_dir,
        tokenizer_file: args.tokenizer_file,
        size: SizeRequest {
            hidden_size: args.hidden_size,
            num_hidden_layers: args.num_hidden_layers,
            label: args.size,
            checkpoint_name: None,
        },
        context_length: args.context_length,
        max_shard_size: parse_shard_size(&args.max_shard_size)?,
    };

    let fetcher = HubFetcher::new(&args.revision).with_token(std::env::var("HF_TOKEN").ok());
    let report = convert(&options, &fetcher)?;

    tracing::info!(
        "Converted model written to {} ({} shard files)",
        options.output_dir.display(),
        report.shard_files.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_snake_case_flags() {
        let args = Args::try_parse_from([
            "rwkv-hub-convert",
            "--model_file",
            "RWKV-4-Pile-169M.pth",
            "--output_dir",
            "out",
            "--num_hidden_layers",
            "6",
        ])
        .unwrap();
        assert_eq!(args.model_file, Some(PathBuf::from("RWKV-4-Pile-169M.pth")));
        assert_eq!(args.num_hidden_layers, Some(6));
        assert_eq!(args.hidden_size, None);
        assert_eq!(args.max_shard_size, "10GB");
        assert_eq!(args.revision, "main");
    }

    #[test]
    fn test_remote_flags_come_in_pairs() {
        let result = Args::try_parse_from([
            "rwkv-hub-convert",
            "--repo_id",
            "BlinkDL/rwkv-4-pile-169m",
            "--output_dir",
            "out",
        ]);
        assert!(result.is_err());
    }
}
