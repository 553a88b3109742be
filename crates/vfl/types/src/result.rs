//! Revealed (plain, non-distributed) stage results
//!
//! Everything in this module is safe to log, print, or serialize: it holds
//! aggregate values only, never party-private rows.

use crate::ids::PartyName;
use serde::{Deserialize, Serialize};

/// Per-party statistics of a matching (PSI) run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyMatchStats {
    pub party: PartyName,
    pub original_count: usize,
    pub intersection_count: usize,
}

/// Result of the match stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    pub parties: Vec<PartyMatchStats>,
}

impl MatchReport {
    /// Size of the intersection (identical for every party)
    pub fn intersection_size(&self) -> usize {
        self.parties
            .first()
            .map(|p| p.intersection_count)
            .unwrap_or(0)
    }

    pub fn for_party(&self, party: &PartyName) -> Option<&PartyMatchStats> {
        self.parties.iter().find(|p| &p.party == party)
    }
}

/// Ranking and classification summary over the full score vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiClassificationMetrics {
    pub positive_samples: usize,
    pub negative_samples: usize,
    pub auc: f64,
    /// Kolmogorov-Smirnov statistic: max(TPR - FPR) over bucket cut points
    pub separation_statistic: f64,
    pub f1_score: f64,
}

/// Confusion-table metrics at a fixed decision threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdMetrics {
    pub threshold: f64,
    pub accuracy: f64,
    pub negative_recall: f64,
    pub positive_recall: f64,
    pub f1_score: f64,
    /// `[[tn, fp], [fn, tp]]`
    pub confusion_matrix: [[u64; 2]; 2],
}

/// Result of the evaluate stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metrics: BiClassificationMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<ThresholdMetrics>,
}

/// Plain summary of what a stage produced, recorded for provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageSummary {
    Matched {
        intersection: usize,
    },
    Loaded {
        rows: usize,
        columns: usize,
    },
    Preprocessed {
        rows: usize,
        columns: usize,
    },
    Split {
        train_rows: usize,
        test_rows: usize,
    },
    Trained {
        rounds: usize,
        features: usize,
    },
    Predicted {
        rows: usize,
        revealed_to: PartyName,
    },
    Evaluated {
        auc: f64,
    },
}
