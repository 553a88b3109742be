//! Cleanup coordinator
//!
//! Runs unconditionally at the end of every pipeline run, successful or
//! not, and always before cluster shutdown: every handle the run still
//! holds is released and the queued remote deallocations are forced while
//! the unit is alive.

use serde::{Deserialize, Serialize};
use vfl_cluster::{BoostParams, ReleaseExt, SecureUnit};
use vfl_stages::{BoostTrainer, SplitHandles};
use vfl_types::{DatasetHandle, PredictionHandle};

/// Distributed state held by one pipeline run
#[derive(Debug)]
pub struct RunState {
    pub dataset: Option<DatasetHandle>,
    pub split: Option<SplitHandles>,
    pub trainer: BoostTrainer,
    pub prediction: Option<PredictionHandle>,
}

impl RunState {
    pub fn new(params: BoostParams) -> Self {
        Self {
            dataset: None,
            split: None,
            trainer: BoostTrainer::new(params),
            prediction: None,
        }
    }

    /// Number of handles currently held
    pub fn held(&self) -> usize {
        usize::from(self.dataset.is_some())
            + self.split.as_ref().map_or(0, |_| 4)
            + usize::from(self.trainer.model().is_some())
            + usize::from(self.prediction.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CleanupReport {
    pub released: usize,
    pub reclaimed: usize,
    pub still_live: usize,
}

pub struct CleanupCoordinator;

impl CleanupCoordinator {
    pub fn cleanup(state: &mut RunState, unit: &dyn SecureUnit) -> CleanupReport {
        let mut released = 0;

        if let Some(prediction) = state.prediction.take() {
            unit.release_handle(prediction);
            released += 1;
        }
        if let Some(model) = state.trainer.take_model() {
            unit.release_handle(model);
            released += 1;
        }
        if let Some(split) = state.split.take() {
            for handle in split.into_handles() {
                unit.release_handle(handle);
                released += 1;
            }
        }
        if let Some(dataset) = state.dataset.take() {
            unit.release_handle(dataset);
            released += 1;
        }

        let reclaimed = unit.reclaim();
        let still_live = unit.live_objects();
        if still_live > 0 {
            tracing::warn!(still_live, "Distributed objects still live after cleanup");
        }
        tracing::info!(released, reclaimed, "Cleanup complete");

        CleanupReport {
            released,
            reclaimed,
            still_live,
        }
    }
}
