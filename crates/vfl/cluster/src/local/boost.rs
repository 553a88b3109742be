//! Second-order gradient boosted trees
//!
//! Candidate splits come from a quantile sketch of each feature (about
//! `1 / sketch_eps` cut points), leaves use L2-regularised Newton steps and
//! every round trains on a seeded row subsample.

use crate::unit::BoostParams;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vfl_types::{Objective, UnitError, UnitResult};

/// Column-major feature matrix with named features
#[derive(Debug, Clone)]
pub struct Features {
    pub names: Vec<String>,
    pub columns: Vec<Vec<f64>>,
}

impl Features {
    pub fn rows(&self) -> usize {
        self.columns.first().map(Vec::len).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn eval(&self, row: &dyn Fn(usize) -> f64) -> f64 {
        match self {
            Node::Leaf(w) => *w,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row(*feature) <= *threshold {
                    left.eval(row)
                } else {
                    right.eval(row)
                }
            }
        }
    }
}

/// A trained ensemble
#[derive(Debug, Clone)]
pub struct BoostModel {
    features: Vec<String>,
    objective: Objective,
    base_margin: f64,
    trees: Vec<Node>,
}

impl BoostModel {
    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn rounds(&self) -> usize {
        self.trees.len()
    }

    /// Score rows; feature columns are matched by name
    pub fn predict(&self, x: &Features) -> UnitResult<Vec<f64>> {
        let mut columns = Vec::with_capacity(self.features.len());
        for name in &self.features {
            let idx = x.names.iter().position(|n| n == name).ok_or_else(|| {
                UnitError::FeatureMismatch(format!("feature '{}' missing at prediction", name))
            })?;
            columns.push(&x.columns[idx]);
        }

        let n = x.rows();
        let scores = (0..n)
            .map(|i| {
                let row = |f: usize| columns[f][i];
                let margin = self.base_margin
                    + self.trees.iter().map(|t| t.eval(&row)).sum::<f64>();
                transform(self.objective, margin)
            })
            .collect();
        Ok(scores)
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn transform(objective: Objective, margin: f64) -> f64 {
    match objective {
        Objective::Logistic => sigmoid(margin),
        Objective::Linear => margin,
    }
}

fn base_margin(params: &BoostParams) -> f64 {
    match params.objective {
        Objective::Logistic => {
            let p = params.base_score.clamp(1e-7, 1.0 - 1e-7);
            (p / (1.0 - p)).ln()
        }
        Objective::Linear => params.base_score,
    }
}

/// Quantile cut points over the given rows of one feature
fn sketch(values: &[f64], rows: &[usize], eps: f64) -> Vec<f64> {
    let mut sorted: Vec<f64> = rows.iter().map(|&i| values[i]).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.dedup();
    if sorted.len() < 2 {
        return Vec::new();
    }

    // More cut points than distinct values cannot add a split
    let bins = ((1.0 / eps).ceil().max(1.0) as usize).min(sorted.len() - 1);
    let mut cuts: Vec<f64> = (1..=bins)
        .map(|b| {
            let pos = (b * sorted.len()) / (bins + 1);
            sorted[pos.min(sorted.len() - 1)]
        })
        .collect();
    cuts.dedup();
    // The largest value cannot split anything off
    let max = sorted[sorted.len() - 1];
    cuts.retain(|&c| c < max);
    if cuts.is_empty() {
        cuts.push(sorted[0]);
    }
    cuts
}

struct TreeBuilder<'a> {
    x: &'a Features,
    grad: &'a [f64],
    hess: &'a [f64],
    cuts: &'a [Vec<f64>],
    params: &'a BoostParams,
}

impl TreeBuilder<'_> {
    fn leaf_weight(&self, g: f64, h: f64) -> f64 {
        -g / (h + self.params.reg_lambda) * self.params.learning_rate
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.reg_lambda)
    }

    fn build(&self, rows: &[usize], depth: usize) -> Node {
        let g: f64 = rows.iter().map(|&i| self.grad[i]).sum();
        let h: f64 = rows.iter().map(|&i| self.hess[i]).sum();

        if depth >= self.params.max_depth || rows.len() < 2 {
            return Node::Leaf(self.leaf_weight(g, h));
        }

        let parent = self.score(g, h);
        let mut best: Option<(f64, usize, f64)> = None;
        for (f, cuts) in self.cuts.iter().enumerate() {
            let values = &self.x.columns[f];
            for &threshold in cuts {
                let (mut gl, mut hl, mut nl) = (0.0, 0.0, 0usize);
                for &i in rows {
                    if values[i] <= threshold {
                        gl += self.grad[i];
                        hl += self.hess[i];
                        nl += 1;
                    }
                }
                if nl == 0 || nl == rows.len() {
                    continue;
                }
                let gain = self.score(gl, hl) + self.score(g - gl, h - hl) - parent;
                if gain > 1e-12 && best.map_or(true, |(b, _, _)| gain > b) {
                    best = Some((gain, f, threshold));
                }
            }
        }

        match best {
            None => Node::Leaf(self.leaf_weight(g, h)),
            Some((_, feature, threshold)) => {
                let values = &self.x.columns[feature];
                let (left, right): (Vec<usize>, Vec<usize>) =
                    rows.iter().partition(|&&i| values[i] <= threshold);
                Node::Split {
                    feature,
                    threshold,
                    left: Box::new(self.build(&left, depth + 1)),
                    right: Box::new(self.build(&right, depth + 1)),
                }
            }
        }
    }
}

/// Fit an ensemble on `x` against labels `y`
pub fn train(x: &Features, y: &[f64], params: &BoostParams) -> UnitResult<BoostModel> {
    let n = x.rows();
    if n == 0 || x.columns.is_empty() {
        return Err(UnitError::Invalid("training set is empty".into()));
    }
    if y.len() != n {
        return Err(UnitError::FeatureMismatch(format!(
            "{} labels for {} rows",
            y.len(),
            n
        )));
    }
    if params.objective == Objective::Logistic && y.iter().any(|&v| v != 0.0 && v != 1.0) {
        return Err(UnitError::Invalid(
            "logistic objective needs 0/1 labels".into(),
        ));
    }

    let base = base_margin(params);
    let mut margins = vec![base; n];
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut trees = Vec::with_capacity(params.num_boost_round);

    for round in 0..params.num_boost_round {
        let (grad, hess): (Vec<f64>, Vec<f64>) = margins
            .iter()
            .zip(y)
            .map(|(&m, &label)| match params.objective {
                Objective::Logistic => {
                    let p = sigmoid(m);
                    (p - label, (p * (1.0 - p)).max(1e-16))
                }
                Objective::Linear => (m - label, 1.0),
            })
            .unzip();

        let mut rows: Vec<usize> = (0..n)
            .filter(|_| rng.gen::<f64>() < params.subsample)
            .collect();
        if rows.is_empty() {
            rows.push(rng.gen_range(0..n));
        }

        let cuts: Vec<Vec<f64>> = x
            .columns
            .iter()
            .map(|col| sketch(col, &rows, params.sketch_eps))
            .collect();

        let builder = TreeBuilder {
            x,
            grad: &grad,
            hess: &hess,
            cuts: &cuts,
            params,
        };
        let tree = builder.build(&rows, 0);

        for (i, m) in margins.iter_mut().enumerate() {
            *m += tree.eval(&|f| x.columns[f][i]);
        }
        tracing::trace!(round, sampled = rows.len(), "Boosting round complete");
        trees.push(tree);
    }

    Ok(BoostModel {
        features: x.names.clone(),
        objective: params.objective,
        base_margin: base,
        trees,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BoostParams {
        BoostParams {
            num_boost_round: 10,
            max_depth: 3,
            sketch_eps: 0.1,
            objective: Objective::Logistic,
            reg_lambda: 0.5,
            subsample: 1.0,
            base_score: 0.5,
            learning_rate: 0.3,
            seed: 42,
        }
    }

    fn separable() -> (Features, Vec<f64>) {
        let xs: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let y = xs.iter().map(|&v| if v >= 20.0 { 1.0 } else { 0.0 }).collect();
        (
            Features {
                names: vec!["x".into()],
                columns: vec![xs],
            },
            y,
        )
    }

    #[test]
    fn test_learns_separable_threshold() {
        let (x, y) = separable();
        let model = train(&x, &y, &params()).unwrap();
        assert_eq!(model.rounds(), 10);

        let scores = model.predict(&x).unwrap();
        assert!(scores[0] < 0.5);
        assert!(scores[39] > 0.5);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_training_is_deterministic() {
        let (x, y) = separable();
        let mut p = params();
        p.subsample = 0.4;
        let a = train(&x, &y, &p).unwrap().predict(&x).unwrap();
        let b = train(&x, &y, &p).unwrap().predict(&x).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_predict_requires_training_features() {
        let (x, y) = separable();
        let model = train(&x, &y, &params()).unwrap();
        let other = Features {
            names: vec!["z".into()],
            columns: vec![vec![0.0]],
        };
        assert!(matches!(
            model.predict(&other),
            Err(UnitError::FeatureMismatch(_))
        ));
    }

    #[test]
    fn test_logistic_rejects_non_binary_labels() {
        let (x, mut y) = separable();
        y[0] = 2.0;
        assert!(train(&x, &y, &params()).is_err());
    }

    #[test]
    fn test_sketch_excludes_max() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        let cuts = sketch(&values, &[0, 1, 2, 3], 0.5);
        assert!(cuts.iter().all(|&c| c < 4.0));
        assert!(!cuts.is_empty());
    }

    #[test]
    fn test_tiny_eps_is_bounded_by_distinct_values() {
        let (x, y) = separable();
        let rows: Vec<usize> = (0..40).collect();
        let cuts = sketch(&x.columns[0], &rows, 1e-300);
        assert!(cuts.len() < 40);
        assert!(cuts.windows(2).all(|w| w[0] < w[1]));

        let mut p = params();
        p.sketch_eps = 1e-9;
        let model = train(&x, &y, &p).unwrap();
        assert_eq!(model.rounds(), 10);
    }
}
