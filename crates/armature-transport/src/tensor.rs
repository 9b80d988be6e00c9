//! Tensor-like byte buffers carried in a parameter payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{TransportError, TransportResult};

/// Element type of a tensor buffer. Multi-byte types are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DType {
    U8 = 0,
    Bool = 1,
    I32 = 2,
    I64 = 3,
    F16 = 4,
    BF16 = 5,
    F32 = 6,
    F64 = 7,
}

impl DType {
    pub fn size(self) -> usize {
        match self {
            Self::U8 | Self::Bool => 1,
            Self::F16 | Self::BF16 => 2,
            Self::I32 | Self::F32 => 4,
            Self::I64 | Self::F64 => 8,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::U8,
            1 => Self::Bool,
            2 => Self::I32,
            3 => Self::I64,
            4 => Self::F16,
            5 => Self::BF16,
            6 => Self::F32,
            7 => Self::F64,
            _ => return None,
        })
    }
}

/// A dense tensor: dtype, shape and raw element bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorBuffer {
    dtype: DType,
    shape: Vec<usize>,
    data: Bytes,
}

impl TensorBuffer {
    /// Wrap raw bytes, checking they match `dtype` and `shape`.
    pub fn new(dtype: DType, shape: Vec<usize>, data: Bytes) -> TransportResult<Self> {
        let expected = shape
            .iter()
            .try_fold(dtype.size(), |bytes, dim| bytes.checked_mul(*dim))
            .ok_or_else(|| TransportError::Decode(format!("tensor shape {shape:?} of {dtype:?} overflows usize")))?;
        if data.len() != expected {
            return Err(TransportError::ShapeMismatch {
                key: String::new(),
                dtype,
                shape,
                got: data.len(),
                expected,
            });
        }
        Ok(Self { dtype, shape, data })
    }

    pub fn from_f32(shape: Vec<usize>, values: &[f32]) -> TransportResult<Self> {
        let mut data = BytesMut::with_capacity(values.len() * DType::F32.size());
        for value in values {
            data.put_f32_le(*value);
        }
        Self::new(DType::F32, shape, data.freeze())
    }

    /// A 1-D `u8` tensor holding the UTF-8 bytes of `text`.
    pub fn from_utf8(text: &str) -> Self {
        Self { dtype: DType::U8, shape: vec![text.len()], data: Bytes::copy_from_slice(text.as_bytes()) }
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn to_f32_vec(&self) -> TransportResult<Vec<f32>> {
        self.expect_dtype(DType::F32)?;
        let mut buf = self.data.clone();
        let mut out = Vec::with_capacity(self.numel());
        while buf.has_remaining() {
            out.push(buf.get_f32_le());
        }
        Ok(out)
    }

    /// Decode a `u8` tensor back into the string it carries.
    pub fn to_utf8(&self) -> TransportResult<String> {
        self.expect_dtype(DType::U8)?;
        String::from_utf8(self.data.to_vec()).map_err(|e| TransportError::Decode(e.to_string()))
    }

    fn expect_dtype(&self, expected: DType) -> TransportResult<()> {
        if self.dtype == expected {
            Ok(())
        } else {
            Err(TransportError::DTypeMismatch { expected, found: self.dtype })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_byte_length() {
        let err = TensorBuffer::new(DType::F32, vec![2, 2], Bytes::from_static(&[0u8; 12])).unwrap_err();
        match err {
            TransportError::ShapeMismatch { got, expected, .. } => {
                assert_eq!(got, 12);
                assert_eq!(expected, 16);
            }
            other => panic!("Expected ShapeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_new_rejects_overflowing_shape() {
        let err = TensorBuffer::new(DType::F32, vec![1 << 40, 1 << 40], Bytes::new()).unwrap_err();
        assert!(matches!(err, TransportError::Decode(ref reason) if reason.contains("overflows")), "{err}");
    }

    #[test]
    fn test_f32_values_survive() {
        let tensor = TensorBuffer::from_f32(vec![3], &[1.5, -0.25, 3.0]).unwrap();
        assert_eq!(tensor.numel(), 3);
        assert_eq!(tensor.data().len(), 12);
        assert_eq!(tensor.to_f32_vec().unwrap(), vec![1.5, -0.25, 3.0]);
    }

    #[test]
    fn test_utf8_tensor_is_u8_vector() {
        let tensor = TensorBuffer::from_utf8("/tmp/learner/train_config.json");
        assert_eq!(tensor.dtype(), DType::U8);
        assert_eq!(tensor.shape(), &[30]);
        assert_eq!(tensor.to_utf8().unwrap(), "/tmp/learner/train_config.json");
    }

    #[test]
    fn test_to_utf8_rejects_other_dtypes() {
        let tensor = TensorBuffer::from_f32(vec![1], &[1.0]).unwrap();
        assert!(matches!(tensor.to_utf8(), Err(TransportError::DTypeMismatch { .. })));
    }

    #[test]
    fn test_dtype_tags_are_stable() {
        for dtype in [DType::U8, DType::Bool, DType::I32, DType::I64, DType::F16, DType::BF16, DType::F32, DType::F64] {
            assert_eq!(DType::from_tag(dtype.tag()), Some(dtype));
        }
        assert_eq!(DType::from_tag(42), None);
    }
}
