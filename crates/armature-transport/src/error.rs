// Error types for parameter transport

use thiserror::Error;

use crate::tensor::DType;

/// Result type for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// The actor's configuration identity differs from the learner's.
    #[error(
        "Actor/Learner config mismatch: actor config_path={actor_path} learner config_path={learner_path} \
         actor config_hash={actor_hash} learner config_hash={learner_hash}. \
         Start the actor with the same config file as the learner."
    )]
    ConsistencyMismatch {
        /// Actor (local) config path
        actor_path: String,
        /// Learner (remote) config path
        learner_path: String,
        /// Actor (local) config hash
        actor_hash: String,
        /// Learner (remote) config hash
        learner_hash: String,
    },

    /// A reserved metadata key was already present in the outgoing payload
    #[error("payload already contains reserved key '{0}'")]
    ReservedKey(String),

    /// A metadata entry could not be decoded
    #[error("malformed metadata entry '{key}': {reason}")]
    MalformedMetadata {
        /// Reserved key
        key: String,
        /// What was wrong with it
        reason: String,
    },

    /// Tensor byte length does not match dtype and shape
    #[error("tensor '{key}' has {got} bytes, expected {expected} for {dtype:?} {shape:?}")]
    ShapeMismatch {
        /// Entry key (empty when not yet inserted)
        key: String,
        /// Element type
        dtype: DType,
        /// Declared shape
        shape: Vec<usize>,
        /// Actual byte length
        got: usize,
        /// Expected byte length
        expected: usize,
    },

    /// Tensor has a different dtype than the caller asked for
    #[error("expected dtype {expected:?}, found {found:?}")]
    DTypeMismatch {
        /// Requested dtype
        expected: DType,
        /// Stored dtype
        found: DType,
    },

    /// Payload bytes could not be decoded
    #[error("invalid parameter payload: {0}")]
    Decode(String),

    /// The parameter channel was closed by the other side
    #[error("parameter channel closed")]
    ChannelClosed,
}
