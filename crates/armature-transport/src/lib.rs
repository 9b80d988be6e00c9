//! Armature Transport
//!
//! Learner → actor parameter transport:
//! - Named tensor payloads and their byte encoding
//! - Config identity embedded under two reserved payload keys
//! - The actor-side consistency gate that rejects updates from a learner
//!   running a different configuration

pub mod channel;
pub mod error;
pub mod gate;
pub mod metadata;
pub mod payload;
pub mod tensor;

pub use channel::{ParameterBroadcaster, ParameterInbox, PolicyParameters};
pub use error::{TransportError, TransportResult};
pub use gate::{AdmittedUpdate, ConsistencyGate, Verification};
pub use metadata::{
    attach_config_metadata, encode_update, extract_config_metadata, strip_config_metadata, ConfigMetadata,
    CONFIG_HASH_METADATA_KEY, CONFIG_PATH_METADATA_KEY,
};
pub use payload::ParameterPayload;
pub use tensor::{DType, TensorBuffer};
