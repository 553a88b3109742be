//! Split stage: seeded train/test split with the label separated out

use crate::adapter::{StageAdapter, StageContext, Staged};
use async_trait::async_trait;
use vfl_cluster::{ReleaseExt, SecureUnit};
use vfl_types::{DatasetHandle, SplitConfig, StageError, StageKind, StageSummary, UnitResult};

/// Features and labels of both sides of the split
#[derive(Debug)]
pub struct SplitHandles {
    pub train_x: DatasetHandle,
    pub train_y: DatasetHandle,
    pub test_x: DatasetHandle,
    pub test_y: DatasetHandle,
}

impl SplitHandles {
    /// Give up all four handles for release
    pub fn into_handles(self) -> [DatasetHandle; 4] {
        [self.train_x, self.train_y, self.test_x, self.test_y]
    }
}

pub struct SplitStage<'a> {
    config: &'a SplitConfig,
    label_col: &'a str,
    dataset: DatasetHandle,
}

impl<'a> SplitStage<'a> {
    pub fn new(config: &'a SplitConfig, label_col: &'a str, dataset: DatasetHandle) -> Self {
        Self {
            config,
            label_col,
            dataset,
        }
    }
}

/// Separate one frame into (features, label), releasing what it created
/// if the second half fails
async fn separate(
    unit: &dyn SecureUnit,
    frame: &DatasetHandle,
    label: &[String],
) -> UnitResult<(DatasetHandle, DatasetHandle)> {
    let x = unit.drop_columns(frame, label).await?;
    match unit.select_columns(frame, label).await {
        Ok(y) => Ok((x, y)),
        Err(e) => {
            unit.release_handle(x);
            Err(e)
        }
    }
}

async fn separate_both(
    unit: &dyn SecureUnit,
    train: &DatasetHandle,
    test: &DatasetHandle,
    label: &[String],
) -> UnitResult<SplitHandles> {
    let (train_x, train_y) = separate(unit, train, label).await?;
    match separate(unit, test, label).await {
        Ok((test_x, test_y)) => Ok(SplitHandles {
            train_x,
            train_y,
            test_x,
            test_y,
        }),
        Err(e) => {
            unit.release_handle(train_x);
            unit.release_handle(train_y);
            Err(e)
        }
    }
}

#[async_trait]
impl<'a> StageAdapter for SplitStage<'a> {
    const KIND: StageKind = StageKind::Split;

    type Output = SplitHandles;

    async fn run(self, ctx: &StageContext<'_>) -> Result<Staged<SplitHandles>, StageError> {
        let unit = ctx.unit;
        let label = vec![self.label_col.to_string()];

        let split = unit
            .split(&self.dataset, self.config.train_size, self.config.random_state)
            .await;
        // The full dataset is superseded either way
        unit.release_handle(self.dataset);
        let (train, test) = split?;

        let handles = separate_both(unit, &train, &test, &label).await;
        unit.release_handle(train);
        unit.release_handle(test);
        let handles = handles?;

        let rows = async {
            let train_rows = unit.shape(&handles.train_y).await?.rows;
            let test_rows = unit.shape(&handles.test_y).await?.rows;
            UnitResult::Ok((train_rows, test_rows))
        }
        .await;
        let (train_rows, test_rows) = match rows {
            Ok(rows) => rows,
            Err(e) => {
                for handle in handles.into_handles() {
                    unit.release_handle(handle);
                }
                return Err(e.into());
            }
        };

        tracing::info!(
            train_rows,
            test_rows,
            random_state = self.config.random_state,
            "Dataset split"
        );
        Ok(Staged::new(
            handles,
            StageSummary::Split {
                train_rows,
                test_rows,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::LoadStage;
    use crate::testing;

    #[tokio::test]
    async fn test_split_separates_label() {
        let dir = tempfile::tempdir().unwrap();
        let cluster = testing::cluster().await;
        let ctx = StageContext::new(&cluster);
        let uid = vec!["uid".to_string()];
        let dataset = LoadStage::new(testing::write_bank_inputs(dir.path(), 50), uid.clone(), uid)
            .run(&ctx)
            .await
            .unwrap()
            .output;

        let config = SplitConfig::default();
        let staged = SplitStage::new(&config, "y", dataset)
            .run(&ctx)
            .await
            .unwrap();
        assert_eq!(
            staged.summary,
            StageSummary::Split {
                train_rows: 40,
                test_rows: 10
            }
        );

        let handles = staged.output;
        let test_y = ctx.unit.shape(&handles.test_y).await.unwrap();
        assert_eq!(test_y.columns(), 1);
        assert_eq!(test_y.owner_of("y").unwrap().as_str(), "bob");
        let train_x = ctx.unit.shape(&handles.train_x).await.unwrap();
        assert!(train_x.owner_of("y").is_none());

        assert_eq!(ctx.unit.live_objects(), 4);
        for handle in handles.into_handles() {
            ctx.unit.release_handle(handle);
        }
        cluster.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_label_releases_everything() {
        let dir = tempfile::tempdir().unwrap();
        let cluster = testing::cluster().await;
        let ctx = StageContext::new(&cluster);
        let uid = vec!["uid".to_string()];
        let dataset = LoadStage::new(testing::write_bank_inputs(dir.path(), 20), uid.clone(), uid)
            .run(&ctx)
            .await
            .unwrap()
            .output;

        let config = SplitConfig::default();
        let err = SplitStage::new(&config, "target", dataset)
            .run(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StageError::Unit(vfl_types::UnitError::ColumnNotFound(_))
        ));
        assert_eq!(ctx.unit.live_objects(), 0);
        cluster.shutdown().await;
    }
}
