use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use candle_core::pickle::{read_pth_tensor_info, PthTensors};
use memmap2::Mmap;
use safetensors::SafeTensors;
use tempfile::NamedTempFile;

use crate::Error;
use crate::tensor::TensorData;

/// Header metadata Hugging Face loaders expect on PyTorch-origin safetensors files.
pub fn pt_format_metadata() -> HashMap<String, String> {
    HashMap::from([("format".to_string(), "pt".to_string())])
}

/// An ordered mapping from parameter name to tensor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Checkpoint {
    entries: Vec<(String, TensorData)>,
    positions: HashMap<String, usize>,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: String, tensor: TensorData) -> Result<(), Error> {
        if self.positions.contains_key(&name) {
            return Err(Error::DuplicateKeyError(name));
        }
        self.positions.insert(name.clone(), self.entries.len());
        self.entries.push((name, tensor));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TensorData> {
        self.positions.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TensorData)> {
        self.entries.iter().map(|(name, tensor)| (name.as_str(), tensor))
    }

    /// Sum of all tensor byte lengths.
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|(_, t)| t.byte_len() as u64).sum()
    }

    /// Load a checkpoint, picking the reader from the file extension.
    pub fn load(path: &Path) -> Result<Self, Error> {
        match path.extension().and_then(|x| x.to_str()) {
            Some("safetensors") => Self::load_safetensors(path),
            Some("pth" | "pt" | "bin" | "ckpt") => Self::load_pth(path),
            _ => Err(Error::UnknownCheckpointFormatError(path.to_path_buf())),
        }
    }

    /// Read a PyTorch pickle state dict in the order its entries are decoded.
    pub fn load_pth(path: &Path) -> Result<Self, Error> {
        tracing::info!("Reading pickle checkpoint {}", path.display());
        // PthTensors indexes by a hash map; the info list carries the order.
        let infos = read_pth_tensor_info(path, false, None)?;
        let tensors = PthTensors::new(path, None)?;
        let mut out = Self::new();
        for info in infos {
            let tensor = tensors
                .get(&info.name)?
                .ok_or_else(|| Error::MissingTensorError(info.name.clone()))?;
            out.insert(info.name, TensorData::from_candle_tensor(&tensor)?)?;
        }
        Ok(out)
    }

    /// Read a safetensors file. Names come back sorted since the container
    /// does not record insertion order.
    pub fn load_safetensors(path: &Path) -> Result<Self, Error> {
        tracing::info!("Reading safetensors checkpoint {}", path.display());
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file) }?;
        let st = SafeTensors::deserialize(&mmap)?;
        let mut names = st.names();
        names.sort();
        let mut out = Self::new();
        for name in names {
            let view = st.tensor(name)?;
            out.insert(name.clone(), TensorData::from_safetensors_view(&view)?)?;
        }
        Ok(out)
    }

    pub fn save_safetensors(&self, path: &Path) -> Result<(), Error> {
        safetensors::serialize_to_file(
            self.entries.iter().map(|(name, tensor)| (name.as_str(), tensor)),
            &Some(pt_format_metadata()),
            path,
        )?;
        Ok(())
    }
}

impl IntoIterator for Checkpoint {
    type Item = (String, TensorData);
    type IntoIter = std::vec::IntoIter<(String, TensorData)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Rewrite a safetensors shard from freshly owned buffers.
///
/// The shard is read through a memory map, every tensor is copied into its own
/// allocation and the result replaces the original through a temporary file in
/// the same directory, keeping the original's permissions. On error the
/// original file is untouched.
pub fn compact_safetensors(path: &Path) -> Result<(), Error> {
    let permissions = std::fs::metadata(path)?.permissions();
    let (metadata, checkpoint) = {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file) }?;
        let (_, header) = SafeTensors::read_metadata(&mmap)?;
        let st = SafeTensors::deserialize(&mmap)?;
        let mut names = st.names();
        names.sort();
        let mut checkpoint = Checkpoint::new();
        for name in names {
            let view = st.tensor(name)?;
            checkpoint.insert(name.clone(), TensorData::from_safetensors_view(&view)?)?;
        }
        (header.metadata().clone(), checkpoint)
    };

    let dir = path
        .parent()
        .filter(|x| !x.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let temp = NamedTempFile::new_in(dir)?;
    safetensors::serialize_to_file(
        checkpoint.iter(),
        &metadata.or_else(|| Some(pt_format_metadata())),
        temp.path(),
    )?;
    // temp files are created owner-only
    temp.as_file().set_permissions(permissions)?;
    temp.persist(path).map_err(|source| Error::PersistError {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!("Compacted {} ({} tensors)", path.display(), checkpoint.len());
    Ok(())
}
