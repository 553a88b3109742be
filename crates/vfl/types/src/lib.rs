//! # VFL shared types
//!
//! Records shared by every crate of the two-party vertical learning
//! pipeline:
//!
//! - party and object identities ([`PartyName`], [`ObjectRef`])
//! - move-only handles to distributed objects ([`DatasetHandle`],
//!   [`ModelHandle`], [`PredictionHandle`])
//! - the pipeline configuration and its loader ([`PipelineConfig`])
//! - the error taxonomy, from [`ConfigError`] up to [`PipelineError`]
//! - stage vocabulary and revealed results

pub mod config;
pub mod error;
pub mod handle;
pub mod ids;
pub mod result;
pub mod stage;

pub use config::{
    BinaryMapping, ClusterConfig, ColumnList, DataConfig, EvalConfig, LinkConfig,
    LoggingConfig, MatchConfig, Objective, PartyConfig, PipelineConfig, PreprocessConfig,
    SecureNodeConfig, SecureRuntimeConfig, SecureUnitConfig, SplitConfig, TrainConfig,
    PSI_PROTOCOLS,
};
pub use error::{
    ClusterInitError, ConfigError, PipelineError, PipelineResult, ShutdownError, StageError,
    UnitError, UnitResult,
};
pub use handle::{DatasetHandle, DistributedHandle, ModelHandle, PredictionHandle};
pub use ids::{ObjectId, ObjectRef, PartyName, UnitId};
pub use result::{
    BiClassificationMetrics, EvaluationReport, MatchReport, PartyMatchStats, StageSummary,
    ThresholdMetrics,
};
pub use stage::{PipelineState, PreprocessStep, StageKind};
