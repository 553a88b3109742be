//! Stage and pipeline state vocabulary

use serde::{Deserialize, Serialize};
use std::fmt;

/// One workflow stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Match,
    Load,
    Preprocess,
    Split,
    Train,
    Predict,
    Evaluate,
}

impl StageKind {
    /// All stages in their fixed order
    pub const ORDER: [StageKind; 7] = [
        StageKind::Match,
        StageKind::Load,
        StageKind::Preprocess,
        StageKind::Split,
        StageKind::Train,
        StageKind::Predict,
        StageKind::Evaluate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Match => "match",
            StageKind::Load => "load",
            StageKind::Preprocess => "preprocess",
            StageKind::Split => "split",
            StageKind::Train => "train",
            StageKind::Predict => "predict",
            StageKind::Evaluate => "evaluate",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Steps of the preprocessing sub-pipeline, in their fixed order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessStep {
    FillUnknown,
    BinaryMap,
    OrdinalEncode,
    OneHotEncode,
    Standardize,
}

impl fmt::Display for PreprocessStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PreprocessStep::FillUnknown => "fill_unknown",
            PreprocessStep::BinaryMap => "binary_map",
            PreprocessStep::OrdinalEncode => "ordinal_encode",
            PreprocessStep::OneHotEncode => "onehot_encode",
            PreprocessStep::Standardize => "standardize",
        };
        f.write_str(s)
    }
}

/// Pipeline state: a linear chain plus an absorbing failure state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum PipelineState {
    Init,
    Running { stage: StageKind },
    Done,
    Failed { stage: Option<StageKind> },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed { .. })
    }

    pub fn stage(&self) -> Option<StageKind> {
        match self {
            PipelineState::Running { stage } => Some(*stage),
            PipelineState::Failed { stage } => *stage,
            _ => None,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Init => f.write_str("INIT"),
            PipelineState::Running { stage } => write!(f, "{}", stage.as_str().to_uppercase()),
            PipelineState::Done => f.write_str("DONE"),
            PipelineState::Failed { stage: Some(stage) } => write!(f, "FAILED({})", stage),
            PipelineState::Failed { stage: None } => f.write_str("FAILED"),
        }
    }
}
