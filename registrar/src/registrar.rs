//! Idempotent, concurrency-safe topic creation.
//!
//! [`TopicRegistrar::ensure_topic`] issues at most one create request per
//! topic name for the lifetime of its [`RegistryState`]. Callers racing on the
//! same name queue behind a per-name gate and re-check the known set once they
//! get through, so only the first of them reaches the broker. Different names
//! use different gates and never wait on each other.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::admin::AdminClient;
use crate::error::{AdminError, RegistrarError};
use crate::topic::TopicSpec;

/// Topic names confirmed present on the broker.
///
/// Names are only ever added. A failed creation leaves no trace, so the next
/// caller retries.
#[derive(Debug, Default)]
pub struct RegistryState {
    known: RwLock<HashSet<String>>,
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RegistryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.known.read().contains(name)
    }

    /// Sorted snapshot of the known names.
    pub fn known_topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.known.read().iter().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.known.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.read().is_empty()
    }

    fn gate(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.gates
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Drop the gate of a name whose creation failed, unless someone else is
    /// queued on it. The map lock keeps new clones from appearing meanwhile.
    fn release_gate(&self, name: &str, gate: &Arc<tokio::sync::Mutex<()>>) {
        let mut gates = self.gates.lock();
        let idle = gates
            .get(name)
            .is_some_and(|g| Arc::ptr_eq(g, gate) && Arc::strong_count(gate) == 2);
        if idle {
            gates.remove(name);
        }
    }

    fn mark_known(&self, name: &str) {
        self.known.write().insert(name.to_string());
        // Late arrivals holding a clone of the gate still re-check `known`.
        self.gates.lock().remove(name);
    }
}

/// Ensures topics exist, creating each one at most once.
#[derive(Clone)]
pub struct TopicRegistrar {
    admin: Arc<dyn AdminClient>,
    state: Arc<RegistryState>,
}

impl TopicRegistrar {
    pub fn new(admin: Arc<dyn AdminClient>) -> Self {
        Self::with_state(admin, Arc::new(RegistryState::new()))
    }

    /// Registrar sharing an existing state, e.g. across several admin clients
    /// pointed at the same cluster.
    pub fn with_state(admin: Arc<dyn AdminClient>, state: Arc<RegistryState>) -> Self {
        Self { admin, state }
    }

    pub fn state(&self) -> &Arc<RegistryState> {
        &self.state
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.state.is_known(name)
    }

    pub fn known_topics(&self) -> Vec<String> {
        self.state.known_topics()
    }

    /// Make sure `spec.name` exists on the broker.
    ///
    /// Returns immediately for known names. Otherwise creates the topic, with
    /// "already exists" counted as success. Any other failure is returned
    /// as-is and the name stays unknown.
    pub async fn ensure_topic(&self, spec: &TopicSpec) -> Result<(), RegistrarError> {
        spec.validate()?;

        if self.state.is_known(&spec.name) {
            debug!(topic = %spec.name, "topic already registered");
            return Ok(());
        }

        let gate = self.state.gate(&spec.name);
        let _guard = gate.lock().await;

        if self.state.is_known(&spec.name) {
            debug!(topic = %spec.name, "topic registered while waiting");
            return Ok(());
        }

        match self.admin.create_topic(spec).await {
            Ok(()) => {
                info!(
                    topic = %spec.name,
                    partitions = spec.partitions,
                    replication_factor = spec.replication_factor,
                    "created topic"
                );
            }
            Err(AdminError::AlreadyExists(_)) => {
                info!(topic = %spec.name, "topic already exists");
            }
            Err(e) => {
                warn!(topic = %spec.name, %e, "failed to create topic");
                self.state.release_gate(&spec.name, &gate);
                return Err(into_registrar_error(e));
            }
        }

        self.state.mark_known(&spec.name);
        Ok(())
    }

    /// Ensure each topic in order, stopping at the first failure.
    pub async fn ensure_topics(&self, specs: &[TopicSpec]) -> Result<(), RegistrarError> {
        for spec in specs {
            self.ensure_topic(spec).await?;
        }
        Ok(())
    }
}

fn into_registrar_error(err: AdminError) -> RegistrarError {
    match err {
        AdminError::Connection(msg) => RegistrarError::ConnectionFailure(msg),
        AdminError::Authorization(msg) => RegistrarError::AuthorizationFailure(msg),
        AdminError::InvalidSpec(msg) => RegistrarError::InvalidSpec(msg),
        AdminError::Other(msg) => RegistrarError::Unknown(msg),
        AdminError::AlreadyExists(name) => {
            RegistrarError::Unknown(format!("unexpected already-exists for '{name}'"))
        }
    }
}
