//! Error taxonomy for the pipeline

use crate::ids::{ObjectRef, PartyName};
use crate::stage::{PipelineState, PreprocessStep, StageKind};
use std::path::PathBuf;
use thiserror::Error;

/// Malformed or missing configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Cluster bring-up errors
#[derive(Debug, Error)]
pub enum ClusterInitError {
    #[error("Invalid address '{address}' for party '{party}'")]
    InvalidAddress { party: String, address: String },

    #[error("Unknown party: {0}")]
    UnknownParty(String),

    #[error("Unrecognized secure protocol: {0}")]
    UnknownProtocol(String),

    #[error("Unrecognized field type: {0}")]
    UnknownField(String),

    #[error("Secure unit topology has no nodes")]
    EmptyTopology,

    #[error("Cluster runtime already initialized")]
    AlreadyInitialized,

    #[error("Backend failure: {0}")]
    Backend(String),
}

/// Errors raised inside the secure unit or its backing runtime
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("Secure unit has shut down")]
    ShutDown,

    #[error("Stale handle {0}: not owned by the live secure unit")]
    StaleHandle(ObjectRef),

    #[error("Unknown or released object {0}")]
    UnknownObject(ObjectRef),

    #[error("Object {object} is not a {expected}")]
    WrongKind {
        object: ObjectRef,
        expected: &'static str,
    },

    #[error("Unknown party: {0}")]
    UnknownParty(PartyName),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Column '{column}' holds only the sentinel value '{sentinel}'")]
    AllSentinel { column: String, sentinel: String },

    #[error("Column '{column}' has value '{value}' outside the mapping")]
    UnmappedValue { column: String, value: String },

    #[error("Column '{column}' is not numeric (found '{value}')")]
    NonNumeric { column: String, value: String },

    #[error("Column '{column}' has a missing value at row {row}")]
    MissingValue { column: String, row: usize },

    #[error("Feature mismatch: {0}")]
    FeatureMismatch(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed CSV {path} at line {line}: {reason}")]
    Csv {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Duplicate key '{key}' in input of party '{party}'")]
    DuplicateKey { party: PartyName, key: String },

    #[error("No common keys between parties")]
    EmptyIntersection,

    #[error("Labels contain a single class; {0}")]
    DegenerateLabels(String),

    #[error("Object {object} belongs to party '{owner}' and cannot be revealed to '{to}'")]
    RevealDenied {
        object: ObjectRef,
        owner: PartyName,
        to: PartyName,
    },

    #[error("Invalid argument: {0}")]
    Invalid(String),
}

/// A stage failed to execute
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Unit(#[from] UnitError),

    #[error("Preprocessing step '{step}' failed on column '{column}': {source}")]
    Preprocess {
        step: PreprocessStep,
        column: String,
        #[source]
        source: UnitError,
    },

    #[error("Model not trained: predict called before train completed")]
    ModelNotTrained,

    #[error("A model is already trained for this run")]
    ModelAlreadyTrained,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid stage input: {0}")]
    Invalid(String),
}

/// Top-level pipeline error: every stage failure carries its stage tag
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Cluster initialization failed: {0}")]
    ClusterInit(#[from] ClusterInitError),

    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: StageKind,
        #[source]
        source: StageError,
    },

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: PipelineState,
        to: PipelineState,
    },
}

impl PipelineError {
    pub fn stage(stage: StageKind, source: StageError) -> Self {
        PipelineError::Stage { stage, source }
    }

    /// The stage this error is tagged with, if any
    pub fn failed_stage(&self) -> Option<StageKind> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn is_model_not_trained(&self) -> bool {
        matches!(
            self,
            PipelineError::Stage {
                source: StageError::ModelNotTrained,
                ..
            }
        )
    }
}

/// Shutdown errors: logged by the lifecycle manager, never propagated
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("{0} distributed objects were still live at shutdown")]
    LiveObjects(usize),

    #[error("Layer '{layer}' failed to shut down: {reason}")]
    Layer { layer: String, reason: String },
}

pub type UnitResult<T> = Result<T, UnitError>;
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_is_tagged() {
        let err = PipelineError::stage(StageKind::Predict, StageError::ModelNotTrained);
        assert_eq!(err.failed_stage(), Some(StageKind::Predict));
        assert!(err.is_model_not_trained());
        assert!(err.to_string().starts_with("Stage 'predict' failed"));
    }

    #[test]
    fn test_preprocess_error_names_column_and_step() {
        let err = StageError::Preprocess {
            step: PreprocessStep::FillUnknown,
            column: "job".into(),
            source: UnitError::AllSentinel {
                column: "job".into(),
                sentinel: "unknown".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("fill_unknown"));
        assert!(msg.contains("'job'"));
    }
}
