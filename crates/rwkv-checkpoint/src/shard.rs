use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::checkpoint::Checkpoint;

pub const SAFE_WEIGHTS_NAME: &str = "model.safetensors";
pub const SAFE_WEIGHTS_INDEX_NAME: &str = "model.safetensors.index.json";
pub const DEFAULT_MAX_SHARD_SIZE: &str = "10GB";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub total_size: u64,
}

/// Manifest recording which shard file holds each parameter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardIndex {
    pub metadata: IndexMetadata,
    pub weight_map: BTreeMap<String, String>,
}

impl ShardIndex {
    /// Sorted keys, two-space indent, trailing newline.
    pub fn to_json_string(&self) -> Result<String, Error> {
        let value = serde_json::to_value(self)?;
        Ok(serde_json::to_string_pretty(&value)? + "\n")
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

pub struct ShardPlan {
    /// Shard file name and contents, in order.
    pub shards: Vec<(String, Checkpoint)>,
    /// Present only when the checkpoint was split into more than one file.
    pub index: Option<ShardIndex>,
}

impl ShardPlan {
    pub fn shard_files(&self) -> Vec<String> {
        self.shards.iter().map(|(name, _)| name.clone()).collect()
    }
}

/// Parse sizes such as `10GB`, `500MB`, `2GiB` or a bare byte count.
pub fn parse_shard_size(size: &str) -> Result<u64, Error> {
    let trimmed = size.trim();
    let upper = trimmed.to_ascii_uppercase();
    let split = upper
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(upper.len());
    let (digits, unit) = upper.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| Error::InvalidShardSizeError(size.to_string()))?;
    let multiplier: u64 = match unit.trim() {
        "" | "B" => 1,
        "KB" => 1_000,
        "MB" => 1_000_000,
        "GB" => 1_000_000_000,
        "KIB" => 1 << 10,
        "MIB" => 1 << 20,
        "GIB" => 1 << 30,
        _ => return Err(Error::InvalidShardSizeError(size.to_string())),
    };
    let bytes = value
        .checked_mul(multiplier)
        .ok_or_else(|| Error::InvalidShardSizeError(size.to_string()))?;
    if bytes == 0 {
        return Err(Error::InvalidShardSizeError(size.to_string()));
    }
    Ok(bytes)
}

fn shard_file_name(weights_name: &str, idx: usize, count: usize) -> String {
    let suffix = format!("-{:05}-of-{:05}", idx + 1, count);
    match weights_name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}{suffix}.{ext}"),
        None => format!("{weights_name}{suffix}"),
    }
}

/// Split a checkpoint into shards of at most `max_shard_size` bytes.
///
/// Tensors are packed greedily in checkpoint order. A tensor that would push
/// the current shard over the limit starts a new one, unless the current shard
/// is still empty, so a single oversized tensor always gets a shard of its own.
pub fn plan_shards(
    checkpoint: Checkpoint,
    max_shard_size: u64,
    weights_name: &str,
) -> Result<ShardPlan, Error> {
    let mut blocks: Vec<Checkpoint> = vec![Checkpoint::new()];
    let mut last_block_size = 0u64;
    let mut total_size = 0u64;

    for (name, tensor) in checkpoint {
        let weight_size = tensor.byte_len() as u64;
        let last = blocks.len() - 1;
        if last_block_size + weight_size > max_shard_size && !blocks[last].is_empty() {
            blocks.push(Checkpoint::new());
            last_block_size = 0;
        }
        let last = blocks.len() - 1;
        blocks[last].insert(name, tensor)?;
        last_block_size += weight_size;
        total_size += weight_size;
    }

    if blocks.len() == 1 {
        let shards = blocks.into_iter().map(|x| (weights_name.to_string(), x)).collect();
        return Ok(ShardPlan { shards, index: None });
    }

    let count = blocks.len();
    let mut weight_map = BTreeMap::new();
    let mut shards = Vec::with_capacity(count);
    for (idx, block) in blocks.into_iter().enumerate() {
        let file_name = shard_file_name(weights_name, idx, count);
        for name in block.names() {
            weight_map.insert(name.to_string(), file_name.clone());
        }
        tracing::debug!("Planned {} with {} tensors", file_name, block.len());
        shards.push((file_name, block));
    }

    Ok(ShardPlan {
        shards,
        index: Some(ShardIndex {
            metadata: IndexMetadata { total_size },
            weight_map,
        }),
    })
}
