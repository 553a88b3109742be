//! Secure compute unit seam
//!
//! Every cross-party computation goes through a [`SecureUnit`]. Stages hold
//! typed handles and pass them back to the unit; they never see
//! party-private rows. Values leave the unit only through the explicit
//! `reveal_*` operations, and only towards a named party.

use crate::protocol::{FieldType, PsiProtocol, SecureProtocol};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use vfl_types::{
    BiClassificationMetrics, BinaryMapping, DatasetHandle, DistributedHandle, LinkConfig,
    MatchReport, ModelHandle, Objective, ObjectRef, PartyName, PredictionHandle, ShutdownError,
    TrainConfig, UnitId, UnitResult,
};

/// Parsed secure unit parameters
#[derive(Debug, Clone)]
pub struct SecureUnitSettings {
    pub nodes: Vec<(PartyName, String)>,
    pub protocol: SecureProtocol,
    pub field: FieldType,
    pub link: LinkConfig,
}

impl SecureUnitSettings {
    pub fn parties(&self) -> impl Iterator<Item = &PartyName> {
        self.nodes.iter().map(|(party, _)| party)
    }
}

/// One private set intersection request over per-party CSV files
#[derive(Debug, Clone)]
pub struct PsiRequest {
    pub key: String,
    pub receiver: PartyName,
    pub protocol: PsiProtocol,
    pub sort: bool,
    pub inputs: BTreeMap<PartyName, PathBuf>,
    pub outputs: BTreeMap<PartyName, PathBuf>,
}

/// Hyperparameters of secure gradient boosting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostParams {
    pub num_boost_round: usize,
    pub max_depth: usize,
    pub sketch_eps: f64,
    pub objective: Objective,
    pub reg_lambda: f64,
    pub subsample: f64,
    pub base_score: f64,
    pub learning_rate: f64,
    pub seed: u64,
}

impl From<&TrainConfig> for BoostParams {
    fn from(config: &TrainConfig) -> Self {
        Self {
            num_boost_round: config.num_boost_round,
            max_depth: config.max_depth,
            sketch_eps: config.sketch_eps,
            objective: config.objective,
            reg_lambda: config.reg_lambda,
            subsample: config.subsample,
            base_score: config.base_score,
            learning_rate: config.learning_rate,
            seed: config.seed,
        }
    }
}

/// Row count and per-party column names of a dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetShape {
    pub rows: usize,
    pub partitions: Vec<(PartyName, Vec<String>)>,
}

impl DatasetShape {
    pub fn columns(&self) -> usize {
        self.partitions.iter().map(|(_, cols)| cols.len()).sum()
    }

    pub fn owner_of(&self, column: &str) -> Option<&PartyName> {
        self.partitions
            .iter()
            .find(|(_, cols)| cols.iter().any(|c| c == column))
            .map(|(party, _)| party)
    }
}

/// The secure multi-party compute unit
#[async_trait]
pub trait SecureUnit: Send + Sync {
    fn id(&self) -> UnitId;

    fn is_alive(&self) -> bool;

    fn settings(&self) -> &SecureUnitSettings;

    /// Intersect per-party CSV files on a key column and write each
    /// party's matched rows to its output path
    async fn psi_csv(&self, request: &PsiRequest) -> UnitResult<MatchReport>;

    /// Read each party's CSV into that party's partition, aligned on `keys`
    async fn load_vertical(
        &self,
        inputs: &BTreeMap<PartyName, PathBuf>,
        keys: &[String],
        drop_keys: &[String],
    ) -> UnitResult<DatasetHandle>;

    async fn shape(&self, dataset: &DatasetHandle) -> UnitResult<DatasetShape>;

    /// Replace sentinel and missing cells with the column mode
    async fn replace_with_mode(
        &self,
        dataset: &DatasetHandle,
        column: &str,
        sentinel: &str,
    ) -> UnitResult<DatasetHandle>;

    async fn map_binary(
        &self,
        dataset: &DatasetHandle,
        column: &str,
        mapping: &BinaryMapping,
    ) -> UnitResult<DatasetHandle>;

    async fn ordinal_encode(&self, dataset: &DatasetHandle, column: &str)
        -> UnitResult<DatasetHandle>;

    async fn one_hot_encode(&self, dataset: &DatasetHandle, column: &str)
        -> UnitResult<DatasetHandle>;

    /// Standardize every column not listed in `exclude`
    async fn standardize(
        &self,
        dataset: &DatasetHandle,
        exclude: &[String],
    ) -> UnitResult<DatasetHandle>;

    /// Seeded shuffle split into (train, test)
    async fn split(
        &self,
        dataset: &DatasetHandle,
        train_size: f64,
        random_state: u64,
    ) -> UnitResult<(DatasetHandle, DatasetHandle)>;

    async fn select_columns(
        &self,
        dataset: &DatasetHandle,
        columns: &[String],
    ) -> UnitResult<DatasetHandle>;

    async fn drop_columns(
        &self,
        dataset: &DatasetHandle,
        columns: &[String],
    ) -> UnitResult<DatasetHandle>;

    async fn train(
        &self,
        x: &DatasetHandle,
        y: &DatasetHandle,
        params: &BoostParams,
    ) -> UnitResult<ModelHandle>;

    /// Score `x`; the scores are materialized only at `reveal_to`
    async fn predict(
        &self,
        model: &ModelHandle,
        x: &DatasetHandle,
        reveal_to: &PartyName,
    ) -> UnitResult<PredictionHandle>;

    async fn biclassification_report(
        &self,
        labels: &DatasetHandle,
        scores: &PredictionHandle,
        bucket_size: usize,
    ) -> UnitResult<BiClassificationMetrics>;

    /// Reveal a single-column label dataset to the party holding it
    async fn reveal_labels(&self, labels: &DatasetHandle, to: &PartyName) -> UnitResult<Vec<f64>>;

    /// Reveal scores to the party they were materialized at
    async fn reveal_scores(
        &self,
        scores: &PredictionHandle,
        to: &PartyName,
    ) -> UnitResult<Vec<f64>>;

    /// Queue a remote object for deallocation
    fn release(&self, object: ObjectRef);

    /// Free every queued object, returning the number freed
    fn reclaim(&self) -> usize;

    fn live_objects(&self) -> usize;

    fn pending_objects(&self) -> usize;

    /// Tear the unit down; live objects at this point are reported
    async fn shutdown(&self) -> Result<(), ShutdownError>;
}

/// Release by typed handle, consuming it
pub trait ReleaseExt {
    fn release_handle<H: DistributedHandle>(&self, handle: H);
}

impl<U: SecureUnit + ?Sized> ReleaseExt for U {
    fn release_handle<H: DistributedHandle>(&self, handle: H) {
        tracing::trace!(kind = H::KIND, object = %handle.object_ref(), "Releasing handle");
        self.release(handle.into_ref());
    }
}
