//! Distributed runtime seam
//!
//! A [`ClusterBackend`] brings up the two layers the pipeline depends on:
//! the scheduling runtime and the secure unit. The lifecycle manager owns
//! both and tears them down in reverse order.

use crate::party::PartyRegistry;
use crate::unit::{SecureUnit, SecureUnitSettings};
use async_trait::async_trait;
use std::sync::Arc;
use vfl_types::{ClusterConfig, ClusterInitError, ShutdownError};

/// The distributed task runtime hosting every party's device
#[async_trait]
pub trait ClusterRuntime: Send + Sync {
    fn is_running(&self) -> bool;

    async fn shutdown(&self) -> Result<(), ShutdownError>;
}

/// Factory for the runtime and secure unit layers
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn start_runtime(
        &self,
        registry: &PartyRegistry,
        config: &ClusterConfig,
    ) -> Result<Arc<dyn ClusterRuntime>, ClusterInitError>;

    async fn start_unit(
        &self,
        registry: &PartyRegistry,
        settings: &SecureUnitSettings,
    ) -> Result<Arc<dyn SecureUnit>, ClusterInitError>;
}
