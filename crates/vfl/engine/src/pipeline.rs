//! Pipeline orchestrator
//!
//! Drives the stages in their fixed order against one live cluster. A
//! stage error moves the state machine to `FAILED`, is tagged with the
//! stage that raised it, and skips every later stage; cleanup and
//! shutdown run either way.

use crate::cleanup::{CleanupCoordinator, CleanupReport, RunState};
use crate::state_machine::{StateMachine, Transition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vfl_cluster::{BoostParams, Cluster, ClusterBackend, LocalBackend};
use vfl_stages::{
    resolve_load_inputs, EvaluateStage, LoadStage, MatchStage, PredictStage, Preprocessor,
    SplitStage, StageAdapter, StageContext, Staged, TrainStage,
};
use vfl_types::{
    DatasetHandle, EvaluationReport, MatchReport, PipelineConfig, PipelineError, PipelineResult,
    PipelineState, StageError, StageKind, StageSummary,
};

/// Provenance of one completed stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageKind,
    pub summary: StageSummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// The externally observable result of a successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_report: Option<MatchReport>,
    pub evaluation: EvaluationReport,
    pub stages: Vec<StageRecord>,
}

/// State machine plus per-stage records
#[derive(Debug, Default)]
struct Progress {
    machine: StateMachine,
    records: Vec<StageRecord>,
}

impl Progress {
    async fn run<A: StageAdapter>(
        &mut self,
        ctx: &StageContext<'_>,
        adapter: A,
    ) -> PipelineResult<A::Output> {
        let stage = A::KIND;
        if let Err(e) = self.machine.begin(stage) {
            return Err(self.interrupted(e));
        }
        let started_at = Utc::now();
        tracing::info!(stage = %stage, "Stage started");

        match adapter.run(ctx).await {
            Ok(Staged { output, summary }) => {
                let finished_at = Utc::now();
                tracing::info!(
                    stage = %stage,
                    elapsed_ms = (finished_at - started_at).num_milliseconds(),
                    "Stage complete"
                );
                self.records.push(StageRecord {
                    stage,
                    summary,
                    started_at,
                    finished_at,
                });
                Ok(output)
            }
            Err(source) => Err(self.failed(stage, source)),
        }
    }

    fn failed(&mut self, stage: StageKind, source: StageError) -> PipelineError {
        tracing::error!(stage = %stage, error = %source, "Stage failed");
        self.record_failure();
        PipelineError::stage(stage, source)
    }

    /// An error raised between stages still ends the run in `FAILED`
    fn interrupted(&mut self, err: PipelineError) -> PipelineError {
        if !self.machine.state().is_terminal() {
            tracing::error!(state = %self.machine.state(), error = %err, "Pipeline interrupted");
            self.record_failure();
        }
        err
    }

    fn record_failure(&mut self) {
        if let Err(e) = self.machine.fail() {
            tracing::warn!(error = %e, "Could not record stage failure");
        }
    }

    /// Take the dataset `produced_by` left behind
    fn take_dataset(
        &mut self,
        state: &mut RunState,
        produced_by: StageKind,
    ) -> PipelineResult<DatasetHandle> {
        match state.dataset.take() {
            Some(dataset) => Ok(dataset),
            None => Err(self.failed(
                produced_by,
                StageError::Invalid("no dataset to consume".into()),
            )),
        }
    }

    fn finish(&mut self) -> PipelineResult<()> {
        match self.machine.complete() {
            Ok(()) => Ok(()),
            Err(e) => Err(self.interrupted(e)),
        }
    }
}

pub struct SecurePipeline {
    config: PipelineConfig,
    progress: Progress,
    state: RunState,
    cleanup: Option<CleanupReport>,
}

impl SecurePipeline {
    /// Validate `config` and prepare a run
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        let params = BoostParams::from(&config.train);
        Ok(Self {
            config,
            progress: Progress::default(),
            state: RunState::new(params),
            cleanup: None,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.progress.machine.state()
    }

    pub fn transitions(&self) -> &[Transition] {
        self.progress.machine.transitions()
    }

    /// Records of the stages that completed, in order
    pub fn records(&self) -> &[StageRecord] {
        &self.progress.records
    }

    /// Report of the cleanup that ended the last execution
    pub fn cleanup_report(&self) -> Option<CleanupReport> {
        self.cleanup
    }

    /// Bring up a local cluster, execute, and shut the cluster down
    pub async fn run(self) -> PipelineResult<RunOutcome> {
        self.run_with(&LocalBackend::new()).await
    }

    pub async fn run_with(mut self, backend: &dyn ClusterBackend) -> PipelineResult<RunOutcome> {
        tracing::info!(
            role = %self.config.role,
            backend = backend.name(),
            matching = self.config.matching.enabled,
            "Starting pipeline"
        );
        let cluster = Cluster::init(&self.config.cluster, &self.config.secure_unit, backend).await?;
        let result = self.execute(&cluster).await;
        cluster.shutdown().await;
        result
    }

    /// Run every stage against an initialized cluster, then clean up.
    ///
    /// The cluster stays up; shutting it down is the caller's job.
    pub async fn execute(&mut self, cluster: &Cluster) -> PipelineResult<RunOutcome> {
        let ctx = StageContext::new(cluster);
        let result = self.run_stages(&ctx).await;

        let report = CleanupCoordinator::cleanup(&mut self.state, ctx.unit);
        self.cleanup = Some(report);

        match &result {
            Ok(outcome) => tracing::info!(
                auc = outcome.evaluation.metrics.auc,
                stages = outcome.stages.len(),
                "Pipeline complete"
            ),
            Err(e) => tracing::error!(
                state = %self.state(),
                error = %e,
                "Pipeline failed"
            ),
        }
        result
    }

    async fn run_stages(&mut self, ctx: &StageContext<'_>) -> PipelineResult<RunOutcome> {
        let Self {
            config,
            progress,
            state,
            ..
        } = self;

        let matched = if config.matching.enabled {
            let output = progress
                .run(ctx, MatchStage::new(&config.matching, &config.data.inputs))
                .await?;
            Some(output)
        } else {
            tracing::info!("Matching disabled, loading the original inputs");
            None
        };

        let inputs = resolve_load_inputs(
            &config.data.inputs,
            matched.as_ref().map(|m| &m.outputs),
        );
        let load = LoadStage::new(
            inputs,
            config.data.keys.to_vec(),
            config.data.drop_keys.to_vec(),
        );
        state.dataset = Some(progress.run(ctx, load).await?);

        let dataset = progress.take_dataset(state, StageKind::Load)?;
        state.dataset = Some(
            progress
                .run(ctx, Preprocessor::new(&config.preprocess, dataset))
                .await?,
        );

        let dataset = progress.take_dataset(state, StageKind::Preprocess)?;
        let split = SplitStage::new(&config.split, &config.preprocess.label_col, dataset);
        let split = state.split.insert(progress.run(ctx, split).await?);

        progress
            .run(
                ctx,
                TrainStage::new(&mut state.trainer, &split.train_x, &split.train_y),
            )
            .await?;

        let predict = PredictStage::new(&state.trainer, &split.test_x, &config.train.predict_to);
        let prediction = state.prediction.insert(progress.run(ctx, predict).await?);

        let evaluation = progress
            .run(
                ctx,
                EvaluateStage::new(&config.eval, &split.test_y, prediction),
            )
            .await?;

        progress.finish()?;
        Ok(RunOutcome {
            match_report: matched.map(|m| m.report),
            evaluation,
            stages: progress.records.clone(),
        })
    }
}
