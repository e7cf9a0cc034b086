//! Small `torch.save` style archives for loader tests.

use std::io::Write;
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Protocol 2 pickle opcodes, the subset `torch.save` emits for a flat state dict.
struct Pickle(Vec<u8>);

impl Pickle {
    fn new() -> Self {
        Self(vec![0x80, 2])
    }

    fn op(&mut self, code: u8) {
        self.0.push(code);
    }

    fn unicode(&mut self, value: &str) {
        self.0.push(b'X');
        self.0.extend((value.len() as u32).to_le_bytes());
        self.0.extend(value.as_bytes());
    }

    fn int(&mut self, value: i32) {
        self.0.push(b'J');
        self.0.extend(value.to_le_bytes());
    }

    fn global(&mut self, module: &str, name: &str) {
        self.0.push(b'c');
        self.0.extend(format!("{module}\n{name}\n").as_bytes());
    }

    /// `torch._utils._rebuild_tensor_v2` over a 1-D float storage.
    fn float_tensor(&mut self, storage_key: &str, len: usize) {
        self.global("torch._utils", "_rebuild_tensor_v2");
        self.op(b'(');
        self.op(b'(');
        self.unicode("storage");
        self.global("torch", "FloatStorage");
        self.unicode(storage_key);
        self.unicode("cpu");
        self.int(len as i32);
        self.op(b't');
        self.op(b'Q');
        self.int(0);
        self.int(len as i32);
        self.op(0x85);
        self.int(1);
        self.op(0x85);
        self.op(0x89);
        self.global("collections", "OrderedDict");
        self.op(b')');
        self.op(b'R');
        self.op(b't');
        self.op(b'R');
    }
}

/// Write 1-D f32 tensors as a PyTorch zip checkpoint. Every entry gets its own
/// SETITEM, so the dict decodes in slice order.
pub fn write_torch_checkpoint(path: &Path, tensors: &[(&str, Vec<f32>)]) {
    let mut pickle = Pickle::new();
    pickle.op(b'}');
    for (i, (name, values)) in tensors.iter().enumerate() {
        pickle.unicode(name);
        pickle.float_tensor(&i.to_string(), values.len());
        pickle.op(b's');
    }
    pickle.op(b'.');

    let mut zip = ZipWriter::new(std::fs::File::create(path).unwrap());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file("archive/data.pkl", options).unwrap();
    zip.write_all(&pickle.0).unwrap();
    for (i, (_, values)) in tensors.iter().enumerate() {
        zip.start_file(format!("archive/data/{i}"), options).unwrap();
        for value in values {
            zip.write_all(&value.to_le_bytes()).unwrap();
        }
    }
    zip.start_file("archive/version", options).unwrap();
    zip.write_all(b"3\n").unwrap();
    zip.finish().unwrap();
}

/// Values unique to tensor `seed`.
pub fn values(seed: usize, len: usize) -> Vec<f32> {
    (0..len).map(|i| (seed * 100 + i) as f32).collect()
}
