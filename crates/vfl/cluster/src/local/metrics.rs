//! Binary classification report computed inside the secure unit

use vfl_types::{BiClassificationMetrics, UnitError, UnitResult};

/// Rank-based AUC with averaged ranks for tied scores
fn auc(labels: &[f64], scores: &[f64], positives: usize, negatives: usize) -> f64 {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && scores[order[end + 1]] == scores[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; ties share the mean of their positions
        let rank = (start + end) as f64 / 2.0 + 1.0;
        for &i in &order[start..=end] {
            ranks[i] = rank;
        }
        start = end + 1;
    }

    let pos_rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|&(&l, _)| l == 1.0)
        .map(|(_, &r)| r)
        .sum();
    let p = positives as f64;
    (pos_rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64)
}

/// Equal-frequency cut points over the sorted scores
fn bucket_cuts(scores: &[f64], bucket_size: usize) -> Vec<f64> {
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    let mut cuts: Vec<f64> = (0..bucket_size)
        .map(|b| sorted[(b * n) / bucket_size])
        .collect();
    cuts.dedup();
    cuts
}

fn f1(tp: f64, fp: f64, fn_: f64) -> f64 {
    let denom = 2.0 * tp + fp + fn_;
    if denom == 0.0 {
        0.0
    } else {
        2.0 * tp / denom
    }
}

/// AUC, KS and best F1 for 0/1 labels against scores
pub fn biclassification(
    labels: &[f64],
    scores: &[f64],
    bucket_size: usize,
) -> UnitResult<BiClassificationMetrics> {
    if labels.len() != scores.len() {
        return Err(UnitError::FeatureMismatch(format!(
            "{} labels for {} scores",
            labels.len(),
            scores.len()
        )));
    }
    if bucket_size == 0 {
        return Err(UnitError::Invalid("bucket_size must be at least 1".into()));
    }
    if let Some(bad) = labels.iter().find(|&&l| l != 0.0 && l != 1.0) {
        return Err(UnitError::Invalid(format!("label {} is not 0 or 1", bad)));
    }

    let positives = labels.iter().filter(|&&l| l == 1.0).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(UnitError::DegenerateLabels(format!(
            "{} positive and {} negative samples",
            positives, negatives
        )));
    }

    let (p, n) = (positives as f64, negatives as f64);
    let mut ks: f64 = 0.0;
    let mut best_f1: f64 = 0.0;
    for cut in bucket_cuts(scores, bucket_size) {
        let (mut tp, mut fp) = (0.0, 0.0);
        for (&l, &s) in labels.iter().zip(scores) {
            if s >= cut {
                if l == 1.0 {
                    tp += 1.0;
                } else {
                    fp += 1.0;
                }
            }
        }
        ks = ks.max(tp / p - fp / n);
        best_f1 = best_f1.max(f1(tp, fp, p - tp));
    }

    Ok(BiClassificationMetrics {
        positive_samples: positives,
        negative_samples: negatives,
        auc: auc(labels, scores, positives, negatives),
        separation_statistic: ks,
        f1_score: best_f1,
    })
}
