//! Secure boosting: train and predict stages
//!
//! [`BoostTrainer`] holds at most one live model per run. Predicting
//! before a model exists is an error and creates nothing.

use crate::adapter::{StageAdapter, StageContext, Staged};
use async_trait::async_trait;
use vfl_cluster::{BoostParams, ReleaseExt, SecureUnit};
use vfl_types::{
    DatasetHandle, ModelHandle, PartyName, PredictionHandle, StageError, StageKind, StageSummary,
};

#[derive(Debug)]
pub struct BoostTrainer {
    params: BoostParams,
    model: Option<ModelHandle>,
}

impl BoostTrainer {
    pub fn new(params: BoostParams) -> Self {
        Self {
            params,
            model: None,
        }
    }

    pub fn params(&self) -> &BoostParams {
        &self.params
    }

    pub fn model(&self) -> Option<&ModelHandle> {
        self.model.as_ref()
    }

    /// Hand the model over for release
    pub fn take_model(&mut self) -> Option<ModelHandle> {
        self.model.take()
    }

    /// Fit the model on the training split
    pub async fn train(
        &mut self,
        unit: &dyn SecureUnit,
        x: &DatasetHandle,
        y: &DatasetHandle,
    ) -> Result<&ModelHandle, StageError> {
        if self.model.is_some() {
            return Err(StageError::ModelAlreadyTrained);
        }
        let model = unit.train(x, y, &self.params).await?;
        tracing::info!(
            model = %model,
            rounds = self.params.num_boost_round,
            max_depth = self.params.max_depth,
            "Model trained"
        );
        Ok(self.model.insert(model))
    }

    /// Score `x`; scores are materialized at `reveal_to` only
    pub async fn predict(
        &self,
        unit: &dyn SecureUnit,
        x: &DatasetHandle,
        reveal_to: &PartyName,
    ) -> Result<PredictionHandle, StageError> {
        let model = self.model.as_ref().ok_or(StageError::ModelNotTrained)?;
        let prediction = unit.predict(model, x, reveal_to).await?;
        tracing::info!(prediction = %prediction, reveal_to = %reveal_to, "Prediction complete");
        Ok(prediction)
    }
}

/// TRAIN as a pipeline stage
pub struct TrainStage<'a> {
    trainer: &'a mut BoostTrainer,
    x: &'a DatasetHandle,
    y: &'a DatasetHandle,
}

impl<'a> TrainStage<'a> {
    pub fn new(trainer: &'a mut BoostTrainer, x: &'a DatasetHandle, y: &'a DatasetHandle) -> Self {
        Self { trainer, x, y }
    }
}

#[async_trait]
impl<'a> StageAdapter for TrainStage<'a> {
    const KIND: StageKind = StageKind::Train;

    type Output = ();

    async fn run(self, ctx: &StageContext<'_>) -> Result<Staged<()>, StageError> {
        let features = ctx.unit.shape(self.x).await?.columns();
        let rounds = self.trainer.params().num_boost_round;
        self.trainer.train(ctx.unit, self.x, self.y).await?;
        Ok(Staged::new((), StageSummary::Trained { rounds, features }))
    }
}

/// PREDICT as a pipeline stage
pub struct PredictStage<'a> {
    trainer: &'a BoostTrainer,
    x: &'a DatasetHandle,
    reveal_to: &'a PartyName,
}

impl<'a> PredictStage<'a> {
    pub fn new(trainer: &'a BoostTrainer, x: &'a DatasetHandle, reveal_to: &'a PartyName) -> Self {
        Self {
            trainer,
            x,
            reveal_to,
        }
    }
}

#[async_trait]
impl<'a> StageAdapter for PredictStage<'a> {
    const KIND: StageKind = StageKind::Predict;

    type Output = PredictionHandle;

    async fn run(self, ctx: &StageContext<'_>) -> Result<Staged<PredictionHandle>, StageError> {
        ctx.registry.get(self.reveal_to)?;
        let prediction = self.trainer.predict(ctx.unit, self.x, self.reveal_to).await?;
        let rows = match ctx.unit.shape(self.x).await {
            Ok(shape) => shape.rows,
            Err(e) => {
                ctx.unit.release_handle(prediction);
                return Err(e.into());
            }
        };
        Ok(Staged::new(
            prediction,
            StageSummary::Predicted {
                rows,
                revealed_to: self.reveal_to.clone(),
            },
        ))
    }
}
