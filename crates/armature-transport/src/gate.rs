//! Actor-side check that a parameter update came from a learner running the
//! same configuration.

use std::sync::Arc;

use armature_recipe::PreflightContext;
use tracing::{debug, error};

use crate::error::{TransportError, TransportResult};
use crate::metadata::{extract_config_metadata, strip_config_metadata};
use crate::payload::ParameterPayload;

/// Outcome of a successful gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Remote path and hash matched the local context.
    Verified,
    /// The payload carried no identity metadata.
    Unverified,
}

/// An update that passed the gate, with the reserved keys removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmittedUpdate {
    pub parameters: ParameterPayload,
    pub verification: Verification,
}

#[derive(Debug, Clone)]
pub struct ConsistencyGate {
    local: Arc<PreflightContext>,
}

impl ConsistencyGate {
    pub fn new(local: Arc<PreflightContext>) -> Self {
        Self { local }
    }

    pub fn local(&self) -> &PreflightContext {
        &self.local
    }

    /// Compare the payload's identity against the local context.
    ///
    /// Absent metadata is accepted as [`Verification::Unverified`]. When
    /// present, both `config_path` and `config_hash` must match exactly.
    pub fn check(&self, payload: &ParameterPayload) -> TransportResult<Verification> {
        let Some(remote) = extract_config_metadata(payload)? else {
            debug!("Parameter update has no config metadata; applying unverified");
            return Ok(Verification::Unverified);
        };

        let local_path = self.local.config_path();
        let local_hash = self.local.config_hash();
        if &remote.config_path != local_path || &remote.config_hash != local_hash {
            error!(
                actor_path = %local_path,
                learner_path = %remote.config_path,
                actor_hash = %local_hash,
                learner_hash = %remote.config_hash,
                "Rejecting parameter update from learner with different config"
            );
            return Err(TransportError::ConsistencyMismatch {
                actor_path: local_path.to_string(),
                learner_path: remote.config_path.to_string(),
                actor_hash: local_hash.to_string(),
                learner_hash: remote.config_hash.to_string(),
            });
        }

        Ok(Verification::Verified)
    }

    /// Check the payload and, if it passes, strip the reserved keys.
    pub fn admit(&self, mut payload: ParameterPayload) -> TransportResult<AdmittedUpdate> {
        let verification = self.check(&payload)?;
        strip_config_metadata(&mut payload);
        Ok(AdmittedUpdate { parameters: payload, verification })
    }
}
