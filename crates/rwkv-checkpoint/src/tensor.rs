use std::borrow::Cow;

use candle_core::WithDType;
use safetensors::tensor::TensorView;
use safetensors::{Dtype, View};

use crate::Error;

/// A dense tensor kept in its raw little-endian encoding.
///
/// Values are never reshaped or converted; the bytes that come out of a
/// checkpoint are the bytes that go into a shard.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorData {
    dtype: Dtype,
    shape: Vec<usize>,
    data: Vec<u8>,
}

fn encode<T: WithDType + bytemuck::Pod>(tensor: &candle_core::Tensor) -> Result<Vec<u8>, Error> {
    let values: Vec<T> = tensor.flatten_all()?.to_vec1()?;
    Ok(bytemuck::cast_slice(&values).to_vec())
}

impl TensorData {
    pub fn new(dtype: Dtype, shape: Vec<usize>, data: Vec<u8>) -> Result<Self, Error> {
        let expected = shape.iter().product::<usize>() * dtype.size();
        if expected != data.len() {
            return Err(Error::TensorSizeError {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { dtype, shape, data })
    }

    pub fn from_candle_tensor(tensor: &candle_core::Tensor) -> Result<Self, Error> {
        let tensor = tensor.to_device(&candle_core::Device::Cpu)?;
        let (dtype, data) = match tensor.dtype() {
            candle_core::DType::F32 => (Dtype::F32, encode::<f32>(&tensor)?),
            candle_core::DType::F16 => (Dtype::F16, encode::<half::f16>(&tensor)?),
            candle_core::DType::BF16 => (Dtype::BF16, encode::<half::bf16>(&tensor)?),
            candle_core::DType::F64 => (Dtype::F64, encode::<f64>(&tensor)?),
            candle_core::DType::U8 => (Dtype::U8, encode::<u8>(&tensor)?),
            candle_core::DType::U32 => (Dtype::U32, encode::<u32>(&tensor)?),
            candle_core::DType::I64 => (Dtype::I64, encode::<i64>(&tensor)?),
            #[allow(unreachable_patterns)]
            other => return Err(Error::UnsupportedDTypeError(format!("{other:?}"))),
        };
        Self::new(dtype, tensor.dims().to_vec(), data)
    }

    pub fn from_safetensors_view(view: &TensorView<'_>) -> Result<Self, Error> {
        let mut data = Vec::new();
        data.try_reserve_exact(view.data().len())?;
        data.extend_from_slice(view.data());
        Self::new(view.dtype(), view.shape().to_vec(), data)
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Storage footprint in bytes, as counted by the shard planner.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

impl View for &TensorData {
    fn dtype(&self) -> Dtype {
        self.dtype
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn data(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.data)
    }

    fn data_len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{Device, Tensor};

    #[test]
    fn test_from_candle_tensor_f32_bytes() {
        let tensor = Tensor::from_vec(vec![1f32, 2., 3., 4., 5., 6.], (2, 3), &Device::Cpu).unwrap();
        let data = TensorData::from_candle_tensor(&tensor).unwrap();
        assert_eq!(data.dtype(), Dtype::F32);
        assert_eq!(data.shape(), &[2, 3]);
        assert_eq!(data.byte_len(), 24);
        assert_eq!(&data.raw_data()[4..8], &2f32.to_le_bytes());
    }

    #[test]
    fn test_from_candle_tensor_keeps_bf16() {
        let values = vec![half::bf16::from_f32(0.5), half::bf16::from_f32(-2.0)];
        let tensor = Tensor::from_vec(values, 2, &Device::Cpu).unwrap();
        let data = TensorData::from_candle_tensor(&tensor).unwrap();
        assert_eq!(data.dtype(), Dtype::BF16);
        assert_eq!(data.byte_len(), 4);
        assert_eq!(&data.raw_data()[0..2], &half::bf16::from_f32(0.5).to_le_bytes());
    }

    #[test]
    fn test_from_candle_tensor_transposed_is_contiguous() {
        let tensor = Tensor::from_vec(vec![1f32, 2., 3., 4.], (2, 2), &Device::Cpu)
            .unwrap()
            .t()
            .unwrap();
        let data = TensorData::from_candle_tensor(&tensor).unwrap();
        let values: Vec<f32> = data
            .raw_data()
            .chunks_exact(4)
            .map(|x| f32::from_le_bytes(x.try_into().unwrap()))
            .collect();
        assert_eq!(values, vec![1., 3., 2., 4.]);
    }

    #[test]
    fn test_new_rejects_wrong_length() {
        let err = TensorData::new(Dtype::F16, vec![3], vec![0u8; 4]).unwrap_err();
        assert!(matches!(err, Error::TensorSizeError { expected: 6, actual: 4, .. }));
    }
}
