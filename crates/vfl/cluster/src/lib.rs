//! # VFL cluster
//!
//! Everything between the pipeline and the distributed machinery:
//!
//! - [`PartyRegistry`]: owner of every per-party virtual device
//! - [`SecureUnit`]: the capability trait for the secure compute unit
//! - [`ClusterBackend`] / [`ClusterRuntime`]: bring-up seams for the runtime layers
//! - [`Cluster`]: the lifecycle manager and per-run context object
//! - [`HandleArena`]: explicit two-step remote deallocation
//! - [`local`]: an in-process backend simulating both parties
//!
//! ```no_run
//! use vfl_cluster::{Cluster, LocalBackend};
//! use vfl_types::PipelineConfig;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::load("pipeline.yaml")?;
//! let backend = LocalBackend::new();
//! let cluster = Cluster::init(&config.cluster, &config.secure_unit, &backend).await?;
//!
//! // ... run stages against cluster.unit() ...
//!
//! cluster.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod arena;
pub mod lifecycle;
pub mod local;
pub mod party;
pub mod protocol;
pub mod runtime;
pub mod unit;

pub use arena::HandleArena;
pub use lifecycle::Cluster;
pub use local::LocalBackend;
pub use party::{Party, PartyHandle, PartyRegistry};
pub use protocol::{FieldType, PsiProtocol, SecureProtocol};
pub use runtime::{ClusterBackend, ClusterRuntime};
pub use unit::{
    BoostParams, DatasetShape, PsiRequest, ReleaseExt, SecureUnit, SecureUnitSettings,
};
