//! Preprocessing sub-pipeline
//!
//! Steps run in a fixed order that configuration cannot change:
//! unknown-value imputation, binary mapping, ordinal encoding, one-hot
//! expansion, standardization. Each step produces a new dataset handle and
//! releases the one it supersedes.

use crate::adapter::{StageAdapter, StageContext, Staged};
use async_trait::async_trait;
use vfl_cluster::{ReleaseExt, SecureUnit};
use vfl_types::{
    DatasetHandle, PreprocessConfig, PreprocessStep, StageError, StageKind, StageSummary,
    UnitError, UnitResult,
};

/// One planned step applied to one column (or, for standardization, to
/// every non-label column)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub step: PreprocessStep,
    pub column: String,
}

pub struct Preprocessor<'a> {
    config: &'a PreprocessConfig,
    dataset: DatasetHandle,
}

impl<'a> Preprocessor<'a> {
    pub fn new(config: &'a PreprocessConfig, dataset: DatasetHandle) -> Self {
        Self { config, dataset }
    }

    /// The steps that will run, in order
    pub fn plan(config: &PreprocessConfig) -> Vec<PlannedStep> {
        let per_column = |step: PreprocessStep, cols: &[String]| {
            cols.iter()
                .map(move |c| PlannedStep {
                    step,
                    column: c.clone(),
                })
                .collect::<Vec<_>>()
        };

        let mut plan = Vec::new();
        plan.extend(per_column(PreprocessStep::FillUnknown, &config.fill_unknown_cols));
        plan.extend(per_column(PreprocessStep::BinaryMap, &config.binary_cols));
        plan.extend(per_column(PreprocessStep::OrdinalEncode, &config.ordinal_cols));
        plan.extend(per_column(PreprocessStep::OneHotEncode, &config.onehot_cols));
        if config.standardize {
            plan.push(PlannedStep {
                step: PreprocessStep::Standardize,
                column: "*".to_string(),
            });
        }
        plan
    }
}

async fn apply(
    config: &PreprocessConfig,
    unit: &dyn SecureUnit,
    current: &DatasetHandle,
    planned: &PlannedStep,
) -> UnitResult<DatasetHandle> {
    let column = planned.column.as_str();
    match planned.step {
        PreprocessStep::FillUnknown => {
            unit.replace_with_mode(current, column, &config.unknown_token)
                .await
        }
        PreprocessStep::BinaryMap => unit.map_binary(current, column, &config.binary_mapping).await,
        PreprocessStep::OrdinalEncode => unit.ordinal_encode(current, column).await,
        PreprocessStep::OneHotEncode => unit.one_hot_encode(current, column).await,
        PreprocessStep::Standardize => {
            let exclude = vec![config.label_col.clone()];
            unit.standardize(current, &exclude).await
        }
    }
}

/// Column an error points at, for errors raised on a whole-frame step
fn offending_column(err: &UnitError) -> Option<&str> {
    match err {
        UnitError::NonNumeric { column, .. }
        | UnitError::MissingValue { column, .. }
        | UnitError::UnmappedValue { column, .. }
        | UnitError::AllSentinel { column, .. }
        | UnitError::ColumnNotFound(column) => Some(column),
        _ => None,
    }
}

#[async_trait]
impl<'a> StageAdapter for Preprocessor<'a> {
    const KIND: StageKind = StageKind::Preprocess;

    type Output = DatasetHandle;

    async fn run(self, ctx: &StageContext<'_>) -> Result<Staged<DatasetHandle>, StageError> {
        let unit = ctx.unit;
        let Preprocessor {
            config,
            dataset: mut current,
        } = self;
        let plan = Self::plan(config);

        for planned in &plan {
            match apply(config, unit, &current, planned).await {
                Ok(next) => {
                    tracing::debug!(
                        step = %planned.step,
                        column = %planned.column,
                        dataset = %next,
                        "Preprocessing step applied"
                    );
                    unit.release_handle(std::mem::replace(&mut current, next));
                }
                Err(source) => {
                    let column = if planned.step == PreprocessStep::Standardize {
                        offending_column(&source)
                            .unwrap_or(planned.column.as_str())
                            .to_string()
                    } else {
                        planned.column.clone()
                    };
                    tracing::warn!(
                        step = %planned.step,
                        column = %column,
                        error = %source,
                        "Preprocessing step failed"
                    );
                    unit.release_handle(current);
                    return Err(StageError::Preprocess {
                        step: planned.step,
                        column,
                        source,
                    });
                }
            }
        }

        let shape = match unit.shape(&current).await {
            Ok(shape) => shape,
            Err(e) => {
                unit.release_handle(current);
                return Err(e.into());
            }
        };
        tracing::info!(
            steps = plan.len(),
            rows = shape.rows,
            columns = shape.columns(),
            "Preprocessing complete"
        );

        Ok(Staged::new(
            current,
            StageSummary::Preprocessed {
                rows: shape.rows,
                columns: shape.columns(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::LoadStage;
    use crate::testing;
    use vfl_cluster::Cluster;

    fn bank_config() -> PreprocessConfig {
        PreprocessConfig {
            fill_unknown_cols: vec!["job".into()],
            binary_cols: vec!["default".into(), "housing".into(), "loan".into()],
            ordinal_cols: vec!["job".into()],
            onehot_cols: vec!["marital".into()],
            ..PreprocessConfig::default()
        }
    }

    async fn loaded(cluster: &Cluster, dir: &std::path::Path) -> DatasetHandle {
        let ctx = StageContext::new(cluster);
        let uid = vec!["uid".to_string()];
        LoadStage::new(testing::write_bank_inputs(dir, 24), uid.clone(), uid)
            .run(&ctx)
            .await
            .unwrap()
            .output
    }

    #[test]
    fn test_plan_order_is_fixed() {
        let config = PreprocessConfig {
            onehot_cols: vec!["marital".into()],
            fill_unknown_cols: vec!["job".into()],
            binary_cols: vec!["loan".into()],
            ..PreprocessConfig::default()
        };
        let steps: Vec<PreprocessStep> = Preprocessor::plan(&config)
            .into_iter()
            .map(|p| p.step)
            .collect();
        assert_eq!(
            steps,
            vec![
                PreprocessStep::FillUnknown,
                PreprocessStep::BinaryMap,
                PreprocessStep::OneHotEncode,
                PreprocessStep::Standardize,
            ]
        );
    }

    #[tokio::test]
    async fn test_preprocess_releases_intermediates() {
        let dir = tempfile::tempdir().unwrap();
        let cluster = testing::cluster().await;
        let ctx = StageContext::new(&cluster);
        let dataset = loaded(&cluster, dir.path()).await;

        let config = bank_config();
        let staged = Preprocessor::new(&config, dataset).run(&ctx).await.unwrap();

        // marital expands into three indicators
        assert_eq!(
            staged.summary,
            StageSummary::Preprocessed {
                rows: 24,
                columns: 10
            }
        );
        assert_eq!(ctx.unit.live_objects(), 1);

        ctx.unit.release_handle(staged.output);
        ctx.unit.reclaim();
        cluster.shutdown().await;
    }

    #[tokio::test]
    async fn test_failure_names_step_and_column() {
        let dir = tempfile::tempdir().unwrap();
        let cluster = testing::cluster().await;
        let ctx = StageContext::new(&cluster);
        let dataset = loaded(&cluster, dir.path()).await;

        // job still holds text when standardization runs
        let config = PreprocessConfig {
            binary_cols: vec!["default".into(), "housing".into(), "loan".into()],
            onehot_cols: vec!["marital".into()],
            ..PreprocessConfig::default()
        };
        let err = Preprocessor::new(&config, dataset).run(&ctx).await.unwrap_err();
        match err {
            StageError::Preprocess { step, column, .. } => {
                assert_eq!(step, PreprocessStep::Standardize);
                assert_eq!(column, "job");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ctx.unit.live_objects(), 0);
        cluster.shutdown().await;
    }

    #[tokio::test]
    async fn test_unmapped_binary_value() {
        let dir = tempfile::tempdir().unwrap();
        let cluster = testing::cluster().await;
        let ctx = StageContext::new(&cluster);
        let dataset = loaded(&cluster, dir.path()).await;

        let config = PreprocessConfig {
            binary_cols: vec!["job".into()],
            ..PreprocessConfig::default()
        };
        let err = Preprocessor::new(&config, dataset).run(&ctx).await.unwrap_err();
        assert!(matches!(
            err,
            StageError::Preprocess {
                step: PreprocessStep::BinaryMap,
                source: UnitError::UnmappedValue { .. },
                ..
            }
        ));
        assert_eq!(ctx.unit.live_objects(), 0);
        cluster.shutdown().await;
    }
}
