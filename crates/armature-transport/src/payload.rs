//! Named-tensor parameter payload and its wire encoding.
//!
//! Layout (integers big-endian, tensor data as stored):
//!
//! ```text
//! "ARMP" | version u16 | count u32 | entries...
//! entry := key_len u32 | key | dtype u8 | ndim u32 | dims u64* | data_len u64 | data
//! ```

use std::collections::BTreeMap;
use std::collections::btree_map;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{TransportError, TransportResult};
use crate::tensor::{DType, TensorBuffer};

const MAGIC: &[u8; 4] = b"ARMP";
const VERSION: u16 = 1;

/// String-keyed collection of tensors sent from learner to actor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterPayload {
    entries: BTreeMap<String, TensorBuffer>,
}

impl ParameterPayload {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, tensor: TensorBuffer) -> Option<TensorBuffer> {
        self.entries.insert(key.into(), tensor)
    }

    pub fn get(&self, key: &str) -> Option<&TensorBuffer> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<TensorBuffer> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, TensorBuffer> {
        self.entries.iter()
    }

    pub fn to_bytes(&self) -> Bytes {
        let body: usize = self
            .entries
            .iter()
            .map(|(key, tensor)| 4 + key.len() + 1 + 4 + 8 * tensor.shape().len() + 8 + tensor.data().len())
            .sum();
        let mut buf = BytesMut::with_capacity(MAGIC.len() + 2 + 4 + body);

        buf.put_slice(MAGIC);
        buf.put_u16(VERSION);
        buf.put_u32(self.entries.len() as u32);
        for (key, tensor) in &self.entries {
            buf.put_u32(key.len() as u32);
            buf.put_slice(key.as_bytes());
            buf.put_u8(tensor.dtype().tag());
            buf.put_u32(tensor.shape().len() as u32);
            for dim in tensor.shape() {
                buf.put_u64(*dim as u64);
            }
            buf.put_u64(tensor.data().len() as u64);
            buf.put_slice(tensor.data());
        }
        buf.freeze()
    }

    pub fn from_bytes(bytes: &[u8]) -> TransportResult<Self> {
        let mut buf = bytes;

        let magic = take(&mut buf, MAGIC.len(), "magic")?;
        if magic != MAGIC {
            return Err(decode_err("bad magic bytes"));
        }
        ensure(&buf, 2, "version")?;
        let version = buf.get_u16();
        if version != VERSION {
            return Err(decode_err(format!("unsupported version {version}")));
        }
        ensure(&buf, 4, "entry count")?;
        let count = buf.get_u32();

        let mut payload = Self::new();
        for _ in 0..count {
            ensure(&buf, 4, "key length")?;
            let key_len = buf.get_u32() as usize;
            let key = std::str::from_utf8(take(&mut buf, key_len, "key")?)
                .map_err(|e| decode_err(format!("key is not UTF-8: {e}")))?
                .to_string();

            ensure(&buf, 1, "dtype")?;
            let tag = buf.get_u8();
            let dtype = DType::from_tag(tag).ok_or_else(|| decode_err(format!("unknown dtype tag {tag} for '{key}'")))?;

            ensure(&buf, 4, "rank")?;
            let ndim = buf.get_u32() as usize;
            ensure(&buf, ndim.saturating_mul(8), "shape")?;
            let shape: Vec<usize> = (0..ndim).map(|_| buf.get_u64() as usize).collect();

            ensure(&buf, 8, "data length")?;
            let data_len = buf.get_u64() as usize;
            let data = Bytes::copy_from_slice(take(&mut buf, data_len, "tensor data")?);

            let tensor = TensorBuffer::new(dtype, shape, data).map_err(|err| match err {
                TransportError::ShapeMismatch { dtype, shape, got, expected, .. } => {
                    TransportError::ShapeMismatch { key: key.clone(), dtype, shape, got, expected }
                }
                TransportError::Decode(reason) => decode_err(format!("tensor '{key}': {reason}")),
                other => other,
            })?;
            if payload.entries.insert(key.clone(), tensor).is_some() {
                return Err(decode_err(format!("duplicate key '{key}'")));
            }
        }

        if buf.has_remaining() {
            return Err(decode_err(format!("{} trailing bytes", buf.remaining())));
        }
        Ok(payload)
    }
}

impl<'a> IntoIterator for &'a ParameterPayload {
    type Item = (&'a String, &'a TensorBuffer);
    type IntoIter = btree_map::Iter<'a, String, TensorBuffer>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<(String, TensorBuffer)> for ParameterPayload {
    fn from_iter<I: IntoIterator<Item = (String, TensorBuffer)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

fn decode_err(reason: impl Into<String>) -> TransportError {
    TransportError::Decode(reason.into())
}

fn ensure(buf: &&[u8], needed: usize, what: &str) -> TransportResult<()> {
    if buf.remaining() < needed {
        return Err(decode_err(format!("truncated {what}: need {needed} bytes, have {}", buf.remaining())));
    }
    Ok(())
}

fn take<'a>(buf: &mut &'a [u8], len: usize, what: &str) -> TransportResult<&'a [u8]> {
    ensure(buf, len, what)?;
    let slice: &'a [u8] = *buf;
    let (head, rest) = slice.split_at(len);
    *buf = rest;
    Ok(head)
}
