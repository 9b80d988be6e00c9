//! Config identity carried inside a parameter payload.
//!
//! The two reserved keys are part of the wire contract between learner and
//! actor. Their values are 1-D `u8` tensors holding UTF-8 strings.

use armature_recipe::{ConfigHash, ConfigPath, PreflightContext};
use bytes::Bytes;
use tracing::debug;

use crate::error::{TransportError, TransportResult};
use crate::payload::ParameterPayload;
use crate::tensor::{DType, TensorBuffer};

pub const CONFIG_PATH_METADATA_KEY: &str = "__armature_recipe_config_path__";
pub const CONFIG_HASH_METADATA_KEY: &str = "__armature_recipe_config_hash__";

/// Remote config identity decoded from a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMetadata {
    pub config_path: ConfigPath,
    pub config_hash: ConfigHash,
}

impl ConfigMetadata {
    pub fn from_context(context: &PreflightContext) -> Self {
        Self { config_path: context.config_path().clone(), config_hash: context.config_hash().clone() }
    }
}

/// Add the reserved identity keys. Fails if either is already present.
pub fn attach_config_metadata(payload: &mut ParameterPayload, context: &PreflightContext) -> TransportResult<()> {
    for key in [CONFIG_PATH_METADATA_KEY, CONFIG_HASH_METADATA_KEY] {
        if payload.contains_key(key) {
            return Err(TransportError::ReservedKey(key.to_string()));
        }
    }
    payload.insert(CONFIG_PATH_METADATA_KEY, TensorBuffer::from_utf8(context.config_path().as_str()));
    payload.insert(CONFIG_HASH_METADATA_KEY, TensorBuffer::from_utf8(context.config_hash().as_str()));
    Ok(())
}

/// Read the identity keys. `None` unless both are present.
pub fn extract_config_metadata(payload: &ParameterPayload) -> TransportResult<Option<ConfigMetadata>> {
    let (Some(path), Some(hash)) = (payload.get(CONFIG_PATH_METADATA_KEY), payload.get(CONFIG_HASH_METADATA_KEY))
    else {
        return Ok(None);
    };

    Ok(Some(ConfigMetadata {
        config_path: ConfigPath::from_normalized(decode_entry(CONFIG_PATH_METADATA_KEY, path)?),
        config_hash: ConfigHash::from_hex(decode_entry(CONFIG_HASH_METADATA_KEY, hash)?),
    }))
}

/// Remove the identity keys so only model parameters reach the policy.
pub fn strip_config_metadata(payload: &mut ParameterPayload) {
    payload.remove(CONFIG_PATH_METADATA_KEY);
    payload.remove(CONFIG_HASH_METADATA_KEY);
}

/// Encode a learner update, tagging it with the learner's identity when enabled.
pub fn encode_update(
    mut parameters: ParameterPayload,
    context: &PreflightContext,
    include_config_metadata: bool,
) -> TransportResult<Bytes> {
    if include_config_metadata {
        attach_config_metadata(&mut parameters, context)?;
    }
    let bytes = parameters.to_bytes();
    debug!(
        entries = parameters.len(),
        bytes = bytes.len(),
        tagged = include_config_metadata,
        "Encoded parameter update"
    );
    Ok(bytes)
}

fn decode_entry(key: &str, tensor: &TensorBuffer) -> TransportResult<String> {
    if tensor.dtype() != DType::U8 || tensor.shape().len() != 1 {
        return Err(TransportError::MalformedMetadata {
            key: key.to_string(),
            reason: format!("expected 1-D U8 tensor, found {:?} {:?}", tensor.dtype(), tensor.shape()),
        });
    }
    tensor.to_utf8().map_err(|e| TransportError::MalformedMetadata { key: key.to_string(), reason: e.to_string() })
}
