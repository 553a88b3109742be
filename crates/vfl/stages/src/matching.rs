//! Match stage: private set intersection over the parties' input files

use crate::adapter::{StageAdapter, StageContext, Staged};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use vfl_cluster::{PsiProtocol, PsiRequest};
use vfl_types::{MatchConfig, MatchReport, PartyName, StageError, StageKind, StageSummary};

/// Result of matching: the revealed report plus where each party's
/// matched rows were written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutput {
    pub report: MatchReport,
    pub outputs: BTreeMap<PartyName, PathBuf>,
}

/// Path of one party's matched rows under `output_dir`
pub fn match_output_path(output_dir: &std::path::Path, party: &PartyName) -> PathBuf {
    output_dir.join(format!("{}_psi_result.csv", party))
}

pub struct MatchStage<'a> {
    config: &'a MatchConfig,
    inputs: &'a BTreeMap<PartyName, PathBuf>,
}

impl<'a> MatchStage<'a> {
    pub fn new(config: &'a MatchConfig, inputs: &'a BTreeMap<PartyName, PathBuf>) -> Self {
        Self { config, inputs }
    }
}

#[async_trait]
impl<'a> StageAdapter for MatchStage<'a> {
    const KIND: StageKind = StageKind::Match;

    type Output = MatchOutput;

    async fn run(self, ctx: &StageContext<'_>) -> Result<Staged<MatchOutput>, StageError> {
        let protocol: PsiProtocol = self.config.protocol.parse()?;
        ctx.registry.get(&self.config.receiver)?;

        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(|source| StageError::Io {
                path: self.config.output_dir.clone(),
                source,
            })?;

        let outputs: BTreeMap<PartyName, PathBuf> = self
            .inputs
            .keys()
            .map(|party| {
                (
                    party.clone(),
                    match_output_path(&self.config.output_dir, party),
                )
            })
            .collect();

        let request = PsiRequest {
            key: self.config.key.clone(),
            receiver: self.config.receiver.clone(),
            protocol,
            sort: self.config.sort,
            inputs: self.inputs.clone(),
            outputs: outputs.clone(),
        };
        let report = ctx.unit.psi_csv(&request).await?;

        for stats in &report.parties {
            tracing::info!(
                party = %stats.party,
                original_count = stats.original_count,
                intersection_count = stats.intersection_count,
                "Matching complete"
            );
        }

        let summary = StageSummary::Matched {
            intersection: report.intersection_size(),
        };
        Ok(Staged::new(MatchOutput { report, outputs }, summary))
    }
}
