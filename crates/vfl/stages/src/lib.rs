//! # VFL stages
//!
//! One adapter per pipeline stage. Each adapter borrows the live cluster
//! through a [`StageContext`], takes ownership of the handles it
//! supersedes, and reports a revealed [`vfl_types::StageSummary`].
//!
//! | Stage      | Adapter            | Output                 |
//! |------------|--------------------|------------------------|
//! | MATCH      | [`MatchStage`]     | [`MatchOutput`]        |
//! | LOAD       | [`LoadStage`]      | dataset handle         |
//! | PREPROCESS | [`Preprocessor`]   | dataset handle         |
//! | SPLIT      | [`SplitStage`]     | [`SplitHandles`]       |
//! | TRAIN      | [`TrainStage`]     | model kept by [`BoostTrainer`] |
//! | PREDICT    | [`PredictStage`]   | prediction handle      |
//! | EVALUATE   | [`EvaluateStage`]  | evaluation report      |

pub mod adapter;
pub mod evaluate;
pub mod load;
pub mod matching;
pub mod preprocess;
pub mod split;
pub mod trainer;

#[cfg(test)]
mod testing;

pub use adapter::{StageAdapter, StageContext, Staged};
pub use evaluate::{confusion_at_threshold, EvaluateStage};
pub use load::{resolve_load_inputs, LoadStage};
pub use matching::{match_output_path, MatchOutput, MatchStage};
pub use preprocess::{PlannedStep, Preprocessor};
pub use split::{SplitHandles, SplitStage};
pub use trainer::{BoostTrainer, PredictStage, TrainStage};
