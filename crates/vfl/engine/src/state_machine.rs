//! State machine: the linear stage chain and its provenance log
//!
//! `INIT → MATCH → LOAD → PREPROCESS → SPLIT → TRAIN → PREDICT → EVALUATE →
//! DONE`, where MATCH may be skipped, plus an absorbing `FAILED` state
//! reachable from any non-terminal state. There are no rewinds and no
//! retries; every accepted transition is recorded with its timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vfl_types::{PipelineError, PipelineResult, PipelineState, StageKind};

/// One accepted transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: PipelineState,
    pub to: PipelineState,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StateMachine {
    state: PipelineState,
    log: Vec<Transition>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Init,
            log: Vec::new(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Every accepted transition, oldest first
    pub fn transitions(&self) -> &[Transition] {
        &self.log
    }

    /// Whether `to` is a legal forward step from `from`
    pub fn allows(from: PipelineState, to: PipelineState) -> bool {
        use PipelineState::*;
        match (from, to) {
            (Init, Running { stage }) => matches!(stage, StageKind::Match | StageKind::Load),
            (Running { stage: StageKind::Evaluate }, Done) => true,
            (Running { stage: current }, Running { stage: next }) => {
                next_stage(current) == Some(next)
            }
            (from, Failed { .. }) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Move forward to `to`
    pub fn advance(&mut self, to: PipelineState) -> PipelineResult<()> {
        if !Self::allows(self.state, to) {
            tracing::warn!(from = %self.state, to = %to, "Rejected pipeline transition");
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.record(to);
        Ok(())
    }

    /// Enter the stage `stage`
    pub fn begin(&mut self, stage: StageKind) -> PipelineResult<()> {
        self.advance(PipelineState::Running { stage })
    }

    pub fn complete(&mut self) -> PipelineResult<()> {
        self.advance(PipelineState::Done)
    }

    /// Enter the absorbing failure state, tagged with the running stage
    pub fn fail(&mut self) -> PipelineResult<()> {
        let stage = self.state.stage();
        self.advance(PipelineState::Failed { stage })
    }

    fn record(&mut self, to: PipelineState) {
        let from = self.state;
        tracing::debug!(from = %from, to = %to, "Pipeline transition");
        self.log.push(Transition {
            from,
            to,
            at: Utc::now(),
        });
        self.state = to;
    }
}

fn next_stage(stage: StageKind) -> Option<StageKind> {
    let position = StageKind::ORDER.iter().position(|s| *s == stage)?;
    StageKind::ORDER.get(position + 1).copied()
}
