//! Evaluate stage: ranking metrics plus an optional fixed-threshold
//! confusion table

use crate::adapter::{StageAdapter, StageContext, Staged};
use async_trait::async_trait;
use vfl_types::{
    DatasetHandle, EvalConfig, EvaluationReport, PredictionHandle, StageError, StageKind,
    StageSummary, ThresholdMetrics,
};

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Confusion table at `threshold`; a score at or above it predicts
/// positive. Ratios with a zero denominator are reported as 0.
pub fn confusion_at_threshold(
    labels: &[f64],
    scores: &[f64],
    threshold: f64,
) -> Result<ThresholdMetrics, StageError> {
    if labels.len() != scores.len() {
        return Err(StageError::Invalid(format!(
            "{} labels for {} scores",
            labels.len(),
            scores.len()
        )));
    }

    let (mut tn, mut fp, mut fn_, mut tp) = (0u64, 0u64, 0u64, 0u64);
    for (&label, &score) in labels.iter().zip(scores) {
        let predicted = score >= threshold;
        match (label == 1.0, predicted) {
            (false, false) => tn += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (true, true) => tp += 1,
        }
    }

    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1_score = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    Ok(ThresholdMetrics {
        threshold,
        accuracy: ratio(tp + tn, tp + tn + fp + fn_),
        negative_recall: ratio(tn, tn + fp),
        positive_recall: recall,
        f1_score,
        confusion_matrix: [[tn, fp], [fn_, tp]],
    })
}

pub struct EvaluateStage<'a> {
    config: &'a EvalConfig,
    labels: &'a DatasetHandle,
    scores: &'a PredictionHandle,
}

impl<'a> EvaluateStage<'a> {
    pub fn new(
        config: &'a EvalConfig,
        labels: &'a DatasetHandle,
        scores: &'a PredictionHandle,
    ) -> Self {
        Self {
            config,
            labels,
            scores,
        }
    }
}

#[async_trait]
impl<'a> StageAdapter for EvaluateStage<'a> {
    const KIND: StageKind = StageKind::Evaluate;

    type Output = EvaluationReport;

    async fn run(self, ctx: &StageContext<'_>) -> Result<Staged<EvaluationReport>, StageError> {
        let metrics = ctx
            .unit
            .biclassification_report(self.labels, self.scores, self.config.bucket_size)
            .await?;
        tracing::info!(
            auc = metrics.auc,
            ks = metrics.separation_statistic,
            f1 = metrics.f1_score,
            positives = metrics.positive_samples,
            negatives = metrics.negative_samples,
            "Evaluation metrics computed"
        );

        let threshold = match self.config.threshold {
            Some(t) => {
                let to = &self.config.confusion_to;
                ctx.registry.get(to)?;
                let labels = ctx.unit.reveal_labels(self.labels, to).await?;
                let scores = ctx.unit.reveal_scores(self.scores, to).await?;
                let table = confusion_at_threshold(&labels, &scores, t)?;
                tracing::info!(
                    threshold = t,
                    accuracy = table.accuracy,
                    f1 = table.f1_score,
                    revealed_to = %to,
                    "Threshold metrics computed"
                );
                Some(table)
            }
            None => None,
        };

        let auc = metrics.auc;
        Ok(Staged::new(
            EvaluationReport { metrics, threshold },
            StageSummary::Evaluated { auc },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::LoadStage;
    use crate::split::SplitStage;
    use crate::testing;
    use crate::trainer::{BoostTrainer, PredictStage, TrainStage};
    use vfl_cluster::{BoostParams, ReleaseExt};
    use vfl_types::{PartyName, SplitConfig, TrainConfig, UnitError};

    #[test]
    fn test_confusion_fixture() {
        let labels = [0.0, 1.0, 1.0, 0.0];
        let scores = [0.1, 0.17, 0.5, 0.3];
        let m = confusion_at_threshold(&labels, &scores, 0.17).unwrap();
        assert_eq!(m.confusion_matrix, [[1, 1], [0, 2]]);
        assert!((m.accuracy - 0.75).abs() < 1e-12);
        assert!((m.negative_recall - 0.5).abs() < 1e-12);
        assert!((m.positive_recall - 1.0).abs() < 1e-12);
        assert!((m.f1_score - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_zero_denominators_report_zero() {
        // no positives predicted, none present
        let m = confusion_at_threshold(&[0.0, 0.0], &[0.1, 0.2], 0.9).unwrap();
        assert_eq!(m.confusion_matrix, [[2, 0], [0, 0]]);
        assert_eq!(m.positive_recall, 0.0);
        assert_eq!(m.f1_score, 0.0);
        assert_eq!(m.accuracy, 1.0);
    }

    #[test]
    fn test_length_mismatch() {
        let err = confusion_at_threshold(&[0.0, 1.0], &[0.5], 0.5).unwrap_err();
        assert!(matches!(err, StageError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_evaluate_after_training() {
        let dir = tempfile::tempdir().unwrap();
        let cluster = testing::cluster().await;
        let ctx = StageContext::new(&cluster);
        let uid = vec!["uid".to_string()];
        let dataset = LoadStage::new(testing::write_bank_inputs(dir.path(), 120), uid.clone(), uid)
            .run(&ctx)
            .await
            .unwrap()
            .output;
        let numeric = ctx
            .unit
            .select_columns(&dataset, &["age".into(), "balance".into(), "y".into()])
            .await
            .unwrap();
        ctx.unit.release_handle(dataset);
        let split_config = SplitConfig::default();
        let handles = SplitStage::new(&split_config, "y", numeric)
            .run(&ctx)
            .await
            .unwrap()
            .output;

        let mut trainer = BoostTrainer::new(BoostParams::from(&TrainConfig::default()));
        TrainStage::new(&mut trainer, &handles.train_x, &handles.train_y)
            .run(&ctx)
            .await
            .unwrap();
        let bob = PartyName::new("bob");
        let prediction = PredictStage::new(&trainer, &handles.test_x, &bob)
            .run(&ctx)
            .await
            .unwrap()
            .output;

        let config = EvalConfig::default();
        let staged = EvaluateStage::new(&config, &handles.test_y, &prediction)
            .run(&ctx)
            .await
            .unwrap();
        let report = staged.output;
        assert!((0.0..=1.0).contains(&report.metrics.auc));
        assert_eq!(
            report.metrics.positive_samples + report.metrics.negative_samples,
            24
        );
        let table = report.threshold.unwrap();
        let total: u64 = table.confusion_matrix.iter().flatten().sum();
        assert_eq!(total, 24);
        assert_eq!(
            staged.summary,
            StageSummary::Evaluated {
                auc: report.metrics.auc
            }
        );

        // Scores revealed to bob never reach alice
        let foreign = EvalConfig {
            confusion_to: PartyName::new("alice"),
            ..EvalConfig::default()
        };
        let err = EvaluateStage::new(&foreign, &handles.test_y, &prediction)
            .run(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StageError::Unit(UnitError::RevealDenied { .. })
        ));

        ctx.unit.release_handle(prediction);
        if let Some(model) = trainer.take_model() {
            ctx.unit.release_handle(model);
        }
        for handle in handles.into_handles() {
            ctx.unit.release_handle(handle);
        }
        ctx.unit.reclaim();
        assert_eq!(ctx.unit.live_objects(), 0);
        cluster.shutdown().await;
    }
}
