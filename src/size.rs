use strum::IntoEnumIterator;

use crate::Error;

pub const DEFAULT_HIDDEN_SIZE: usize = 256;
pub const DEFAULT_NUM_HIDDEN_LAYERS: usize = 12;

/// Published RWKV-4 model scales, in the order filename inference tries them.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum_macros::EnumIter,
    strum_macros::EnumString,
    strum_macros::Display,
    strum_macros::IntoStaticStr,
)]
pub enum SizeProfile {
    #[strum(serialize = "169M")]
    Params169M,
    #[strum(serialize = "430M")]
    Params430M,
    #[strum(serialize = "1B5")]
    Params1B5,
    #[strum(serialize = "3B")]
    Params3B,
    #[strum(serialize = "7B")]
    Params7B,
    #[strum(serialize = "14B")]
    Params14B,
}

impl SizeProfile {
    pub fn label(self) -> &'static str {
        self.into()
    }

    pub fn hidden_size(self) -> usize {
        match self {
            SizeProfile::Params169M => 768,
            SizeProfile::Params430M => 1024,
            SizeProfile::Params1B5 => 2048,
            SizeProfile::Params3B => 2560,
            SizeProfile::Params7B => 4096,
            SizeProfile::Params14B => 5120,
        }
    }

    pub fn num_hidden_layers(self) -> usize {
        match self {
            SizeProfile::Params169M => 12,
            SizeProfile::Params430M => 24,
            SizeProfile::Params1B5 => 24,
            SizeProfile::Params3B => 32,
            SizeProfile::Params7B => 32,
            SizeProfile::Params14B => 40,
        }
    }

    pub fn dimensions(self) -> ModelDimensions {
        ModelDimensions {
            hidden_size: self.hidden_size(),
            num_hidden_layers: self.num_hidden_layers(),
        }
    }

    pub fn labels() -> Vec<&'static str> {
        Self::iter().map(Self::label).collect()
    }

    pub fn from_label(label: &str) -> Result<Self, Error> {
        label.parse().map_err(|_| {
            Error::ConfigResolutionError(format!(
                "`size` should be one of {:?}, got {label}",
                Self::labels()
            ))
        })
    }

    /// First profile whose label appears in `name`.
    pub fn infer_from_name(name: &str) -> Option<Self> {
        Self::iter().find(|x| name.contains(x.label()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelDimensions {
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
}

/// Everything the caller said (or implied) about the model size.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SizeRequest {
    pub hidden_size: Option<usize>,
    pub num_hidden_layers: Option<usize>,
    pub label: Option<String>,
    pub checkpoint_name: Option<String>,
}

impl SizeRequest {
    /// Explicit pair, then label, then a label found in the checkpoint name.
    ///
    /// Supplying either half of the pair makes it explicit; the other half
    /// takes its default.
    pub fn resolve(&self) -> Result<ModelDimensions, Error> {
        if self.hidden_size.is_some() || self.num_hidden_layers.is_some() {
            return Ok(ModelDimensions {
                hidden_size: self.hidden_size.unwrap_or(DEFAULT_HIDDEN_SIZE),
                num_hidden_layers: self.num_hidden_layers.unwrap_or(DEFAULT_NUM_HIDDEN_LAYERS),
            });
        }
        if let Some(label) = &self.label {
            return Ok(SizeProfile::from_label(label)?.dimensions());
        }
        self.checkpoint_name
            .as_deref()
            .and_then(SizeProfile::infer_from_name)
            .map(|profile| {
                tracing::info!("Inferred model size {} from checkpoint name", profile);
                profile.dimensions()
            })
            .ok_or_else(|| {
                Error::ConfigResolutionError(
                    "could not infer the size, please provide it with the `--size` argument".to_string(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_tables() {
        assert_eq!(SizeProfile::labels(), vec!["169M", "430M", "1B5", "3B", "7B", "14B"]);
        let dims = SizeProfile::Params3B.dimensions();
        assert_eq!(dims.hidden_size, 2560);
        assert_eq!(dims.num_hidden_layers, 32);
        assert_eq!(SizeProfile::Params14B.num_hidden_layers(), 40);
        assert_eq!(SizeProfile::from_label("1B5").unwrap(), SizeProfile::Params1B5);
    }

    #[test]
    fn test_explicit_pair_beats_label() {
        let request = SizeRequest {
            hidden_size: Some(512),
            num_hidden_layers: Some(6),
            label: Some("7B".to_string()),
            checkpoint_name: Some("RWKV-4-Pile-430M.pth".to_string()),
        };
        assert_eq!(
            request.resolve().unwrap(),
            ModelDimensions { hidden_size: 512, num_hidden_layers: 6 }
        );
    }

    #[test]
    fn test_partial_pair_uses_defaults() {
        let request = SizeRequest {
            num_hidden_layers: Some(2),
            ..Default::default()
        };
        assert_eq!(
            request.resolve().unwrap(),
            ModelDimensions { hidden_size: DEFAULT_HIDDEN_SIZE, num_hidden_layers: 2 }
        );
    }

    #[test]
    fn test_label_reads_both_tables() {
        let request = SizeRequest {
            label: Some("430M".to_string()),
            checkpoint_name: Some("RWKV-4-Pile-14B.pth".to_string()),
            ..Default::default()
        };
        assert_eq!(
            request.resolve().unwrap(),
            ModelDimensions { hidden_size: 1024, num_hidden_layers: 24 }
        );
    }

    #[test]
    fn test_infer_from_checkpoint_name() {
        let request = SizeRequest {
            checkpoint_name: Some("RWKV-4-Pile-430M-20220808-8066.pth".to_string()),
            ..Default::default()
        };
        assert_eq!(request.resolve().unwrap(), SizeProfile::Params430M.dimensions());
    }

    #[test]
    fn test_unknown_label() {
        let request = SizeRequest {
            label: Some("999Z".to_string()),
            ..Default::default()
        };
        let err = request.resolve().unwrap_err();
        assert!(matches!(err, Error::ConfigResolutionError(msg) if msg.contains("999Z")));
    }

    #[test]
    fn test_inference_without_match() {
        let request = SizeRequest {
            checkpoint_name: Some("rwkv-custom.pth".to_string()),
            ..Default::default()
        };
        assert!(matches!(request.resolve(), Err(Error::ConfigResolutionError(_))));
        assert!(matches!(SizeRequest::default().resolve(), Err(Error::ConfigResolutionError(_))));
    }
}
