//! In-process learner → actor parameter channel.
//!
//! The learner encodes each update once and fans the bytes out over bounded
//! `tokio::sync::mpsc` channels. Each actor owns an inbox that decodes and
//! gates what it receives before anything touches the policy.

use std::sync::Arc;
use std::time::Duration;

use armature_recipe::PreflightContext;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{TransportError, TransportResult};
use crate::gate::{AdmittedUpdate, ConsistencyGate, Verification};
use crate::metadata::encode_update;
use crate::payload::ParameterPayload;

/// Anything that can take a fresh set of parameters (an actor's policy).
pub trait PolicyParameters {
    fn load_parameters(&mut self, parameters: ParameterPayload) -> TransportResult<()>;
}

/// Learner side: tags and sends parameter updates to every subscribed actor.
#[derive(Debug)]
pub struct ParameterBroadcaster {
    context: Arc<PreflightContext>,
    include_config_metadata: bool,
    subscribers: Vec<mpsc::Sender<Bytes>>,
}

impl ParameterBroadcaster {
    pub fn new(context: Arc<PreflightContext>, include_config_metadata: bool) -> Self {
        Self { context, include_config_metadata, subscribers: Vec::new() }
    }

    /// Open a bounded channel to a new actor and return its receiving end.
    pub fn subscribe(&mut self, capacity: usize) -> mpsc::Receiver<Bytes> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.subscribers.push(tx);
        debug!(subscribers = self.subscribers.len(), capacity, "Actor subscribed to parameter updates");
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Send one update to every live subscriber. Returns how many received it.
    ///
    /// Subscribers whose receiver was dropped are removed.
    pub async fn broadcast(&mut self, parameters: ParameterPayload) -> TransportResult<usize> {
        let bytes = encode_update(parameters, &self.context, self.include_config_metadata)?;

        // The subscriber list stays intact across every await, so a cancelled
        // broadcast loses no actors.
        let mut delivered = 0;
        for tx in &self.subscribers {
            if tx.send(bytes.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        let before = self.subscribers.len();
        self.subscribers.retain(|tx| !tx.is_closed());
        if self.subscribers.len() < before {
            warn!(dropped = before - self.subscribers.len(), "Dropping closed actor subscriptions");
        }

        debug!(delivered, bytes = bytes.len(), "Broadcast parameter update");
        Ok(delivered)
    }
}

/// Actor side: receives, decodes and gates parameter updates.
#[derive(Debug)]
pub struct ParameterInbox {
    rx: mpsc::Receiver<Bytes>,
    gate: ConsistencyGate,
    timeout: Option<Duration>,
}

impl ParameterInbox {
    pub fn new(rx: mpsc::Receiver<Bytes>, local: Arc<PreflightContext>) -> Self {
        Self { rx, gate: ConsistencyGate::new(local), timeout: None }
    }

    /// Bound how long [`next_update`](Self::next_update) waits for the learner.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn gate(&self) -> &ConsistencyGate {
        &self.gate
    }

    /// Wait for the next update and run it through the gate.
    ///
    /// Returns `Ok(None)` when the timeout elapses with nothing received.
    pub async fn next_update(&mut self) -> TransportResult<Option<AdmittedUpdate>> {
        let received = match self.timeout {
            Some(limit) => match timeout(limit, self.rx.recv()).await {
                Ok(received) => received,
                Err(_) => {
                    debug!(timeout_ms = limit.as_millis() as u64, "No parameter update before timeout");
                    return Ok(None);
                }
            },
            None => self.rx.recv().await,
        };

        let bytes = received.ok_or(TransportError::ChannelClosed)?;
        let payload = ParameterPayload::from_bytes(&bytes)?;
        self.gate.admit(payload).map(Some)
    }

    /// Receive one update and load it into `policy` if it passes the gate.
    ///
    /// A rejected update is discarded and the policy is left untouched.
    pub async fn update_policy<P: PolicyParameters>(&mut self, policy: &mut P) -> TransportResult<Option<Verification>> {
        let Some(update) = self.next_update().await? else {
            return Ok(None);
        };
        let entries = update.parameters.len();
        policy.load_parameters(update.parameters)?;
        info!(entries, verification = ?update.verification, "Loaded parameter update into policy");
        Ok(Some(update.verification))
    }
}
