//! Cluster lifecycle manager
//!
//! [`Cluster`] is the explicit context object for one run: it owns the
//! party registry, the runtime layer and the single secure unit. Shutdown
//! is layered and best effort: the secure unit first, then the runtime,
//! with failures in one layer logged and never blocking the next.

use crate::party::{validate_address, PartyRegistry};
use crate::protocol::{FieldType, SecureProtocol};
use crate::runtime::{ClusterBackend, ClusterRuntime};
use crate::unit::{SecureUnit, SecureUnitSettings};
use std::sync::Arc;
use tokio::sync::RwLock;
use vfl_types::{ClusterConfig, ClusterInitError, SecureUnitConfig};

/// Live cluster: registry, runtime and secure unit
pub struct Cluster {
    registry: PartyRegistry,
    runtime: Arc<dyn ClusterRuntime>,
    unit: Arc<dyn SecureUnit>,
    shut_down: RwLock<bool>,
}

impl Cluster {
    /// Bring up the runtime and the secure unit through `backend`
    pub async fn init(
        cluster: &ClusterConfig,
        secure_unit: &SecureUnitConfig,
        backend: &dyn ClusterBackend,
    ) -> Result<Self, ClusterInitError> {
        tracing::info!(
            backend = backend.name(),
            self_party = %cluster.self_party,
            parties = cluster.parties.len(),
            "Initializing cluster"
        );

        let registry = PartyRegistry::from_config(cluster)?;
        let settings = parse_unit_settings(secure_unit, &registry)?;

        tracing::debug!("Step 1: Starting runtime");
        let runtime = backend.start_runtime(&registry, cluster).await?;

        tracing::debug!(
            protocol = %settings.protocol,
            field = %settings.field,
            nodes = settings.nodes.len(),
            "Step 2: Starting secure unit"
        );
        let unit = match backend.start_unit(&registry, &settings).await {
            Ok(unit) => unit,
            Err(e) => {
                if let Err(shutdown_err) = runtime.shutdown().await {
                    tracing::warn!(error = %shutdown_err, "Runtime teardown after failed unit start failed");
                }
                return Err(e);
            }
        };

        tracing::info!(unit = %unit.id(), "Cluster ready");

        Ok(Self {
            registry,
            runtime,
            unit,
            shut_down: RwLock::new(false),
        })
    }

    pub fn registry(&self) -> &PartyRegistry {
        &self.registry
    }

    /// The run's secure unit, borrowed by every stage
    pub fn unit(&self) -> &dyn SecureUnit {
        self.unit.as_ref()
    }

    pub fn runtime_running(&self) -> bool {
        self.runtime.is_running()
    }

    pub async fn is_shut_down(&self) -> bool {
        *self.shut_down.read().await
    }

    /// Tear down the secure unit, then the runtime.
    ///
    /// Never fails; a second call is a logged no-op.
    pub async fn shutdown(&self) {
        let mut shut_down = self.shut_down.write().await;
        if *shut_down {
            tracing::warn!("Cluster already shut down");
            return;
        }
        *shut_down = true;
        drop(shut_down);

        tracing::info!("Shutting down cluster");

        tracing::debug!("Step 1: Shutting down secure unit");
        if let Err(e) = self.unit.shutdown().await {
            tracing::error!(layer = "secure_unit", error = %e, "Secure unit shutdown reported an error");
        }

        tracing::debug!("Step 2: Shutting down runtime");
        if let Err(e) = self.runtime.shutdown().await {
            tracing::error!(layer = "runtime", error = %e, "Runtime shutdown reported an error");
        }

        tracing::info!("Cluster shutdown complete");
    }
}

fn parse_unit_settings(
    config: &SecureUnitConfig,
    registry: &PartyRegistry,
) -> Result<SecureUnitSettings, ClusterInitError> {
    if config.nodes.is_empty() {
        return Err(ClusterInitError::EmptyTopology);
    }

    let mut nodes = Vec::with_capacity(config.nodes.len());
    for node in &config.nodes {
        if !registry.contains(&node.party) {
            return Err(ClusterInitError::UnknownParty(node.party.to_string()));
        }
        validate_address(node.party.as_str(), &node.address)?;
        nodes.push((node.party.clone(), node.address.clone()));
    }

    let protocol: SecureProtocol = config.runtime.protocol.parse()?;
    let field: FieldType = config.runtime.field.parse()?;

    Ok(SecureUnitSettings {
        nodes,
        protocol,
        field,
        link: config.link.clone(),
    })
}
