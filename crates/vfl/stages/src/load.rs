//! Load stage: per-party CSVs joined vertically into one dataset handle

use crate::adapter::{StageAdapter, StageContext, Staged};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use vfl_cluster::ReleaseExt;
use vfl_types::{DatasetHandle, PartyName, StageError, StageKind, StageSummary};

/// Choose what LOAD reads: the original inputs when matching was skipped,
/// the matched outputs when it ran
pub fn resolve_load_inputs(
    original: &BTreeMap<PartyName, PathBuf>,
    match_outputs: Option<&BTreeMap<PartyName, PathBuf>>,
) -> BTreeMap<PartyName, PathBuf> {
    match match_outputs {
        Some(outputs) => outputs.clone(),
        None => original.clone(),
    }
}

pub struct LoadStage {
    inputs: BTreeMap<PartyName, PathBuf>,
    keys: Vec<String>,
    drop_keys: Vec<String>,
}

impl LoadStage {
    pub fn new(
        inputs: BTreeMap<PartyName, PathBuf>,
        keys: Vec<String>,
        drop_keys: Vec<String>,
    ) -> Self {
        Self {
            inputs,
            keys,
            drop_keys,
        }
    }

    pub fn inputs(&self) -> &BTreeMap<PartyName, PathBuf> {
        &self.inputs
    }
}

#[async_trait]
impl StageAdapter for LoadStage {
    const KIND: StageKind = StageKind::Load;

    type Output = DatasetHandle;

    async fn run(self, ctx: &StageContext<'_>) -> Result<Staged<DatasetHandle>, StageError> {
        for (party, path) in &self.inputs {
            ctx.registry.get(party)?;
            tracing::debug!(party = %party, path = %path.display(), "Loading partition");
        }

        let dataset = ctx
            .unit
            .load_vertical(&self.inputs, &self.keys, &self.drop_keys)
            .await?;

        let shape = match ctx.unit.shape(&dataset).await {
            Ok(shape) => shape,
            Err(e) => {
                ctx.unit.release_handle(dataset);
                return Err(e.into());
            }
        };

        tracing::info!(rows = shape.rows, columns = shape.columns(), "Dataset loaded");
        let summary = StageSummary::Loaded {
            rows: shape.rows,
            columns: shape.columns(),
        };
        Ok(Staged::new(dataset, summary))
    }
}
