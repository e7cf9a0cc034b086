//! Renames BlinkDL RWKV parameter names into the Hugging Face `RwkvForCausalLM` layout.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use rwkv_checkpoint::Checkpoint;

use crate::Error;

pub const MODULE_PREFIX: &str = "rwkv.";
pub const HEAD_KEY: &str = "head.weight";

/// One step of the rename pass.
pub enum RenameRule {
    /// Replace a leading prefix.
    Prefix { from: &'static str, to: &'static str },
    /// Regex over a `blocks.<N>.<segment>` path; the block index is kept.
    BlockSegment { pattern: Regex, replacement: &'static str },
    /// Replace a trailing suffix.
    Suffix { from: &'static str, to: &'static str },
}

impl RenameRule {
    fn block_segment(pattern: &str, replacement: &'static str) -> Self {
        let pattern = Regex::new(pattern).unwrap_or_else(|e| panic!("invalid rename pattern {pattern}: {e}"));
        Self::BlockSegment { pattern, replacement }
    }

    pub fn apply(&self, name: String) -> String {
        match self {
            RenameRule::Prefix { from, to } => match name.strip_prefix(from) {
                Some(rest) => format!("{to}{rest}"),
                None => name,
            },
            RenameRule::BlockSegment { pattern, replacement } => {
                pattern.replace_all(&name, *replacement).into_owned()
            }
            RenameRule::Suffix { from, to } => match name.strip_suffix(from) {
                Some(rest) => format!("{rest}{to}"),
                None => name,
            },
        }
    }
}

/// Rules in application order. Block-indexed rewrites run before the suffix
/// rules, which match on the fully qualified name.
pub static RENAME_RULES: LazyLock<Vec<RenameRule>> = LazyLock::new(|| {
    vec![
        RenameRule::Prefix { from: "emb.", to: "embeddings." },
        // ln0 only exists on block 0
        RenameRule::Prefix { from: "blocks.0.ln0", to: "blocks.0.pre_ln" },
        RenameRule::block_segment(r"blocks\.(\d+)\.att\b", "blocks.${1}.attention"),
        RenameRule::block_segment(r"blocks\.(\d+)\.ffn\b", "blocks.${1}.feed_forward"),
        RenameRule::Suffix { from: ".time_mix_k", to: ".time_mix_key" },
        RenameRule::Suffix { from: ".time_mix_v", to: ".time_mix_value" },
        RenameRule::Suffix { from: ".time_mix_r", to: ".time_mix_receptance" },
    ]
});

pub fn rename_key(name: &str) -> String {
    let name = RENAME_RULES
        .iter()
        .fold(name.to_string(), |name, rule| rule.apply(name));
    if name == HEAD_KEY {
        name
    } else {
        format!("{MODULE_PREFIX}{name}")
    }
}

/// Build a renamed copy of `state_dict`. Tensors are moved, never modified.
pub fn convert_state_dict(state_dict: Checkpoint) -> Result<Checkpoint, Error> {
    let mut sources: HashMap<String, String> = HashMap::with_capacity(state_dict.len());
    let mut out = Checkpoint::new();
    for (name, tensor) in state_dict {
        let new_name = rename_key(&name);
        if let Some(first) = sources.get(&new_name) {
            return Err(Error::DuplicateKeyError {
                target: new_name,
                first: first.clone(),
                second: name,
            });
        }
        tracing::debug!("{} -> {}", name, new_name);
        sources.insert(new_name.clone(), name);
        out.insert(new_name, tensor)?;
    }
    Ok(out)
}
